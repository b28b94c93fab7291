//! DDL of the exchange schema, generated from the rule table.

use log::debug;
use netxfer_core::RULES;
use netxfer_core::rules::{FieldKind, FieldRule, TEXT_POSITION_TABLE};
use rusqlite::Connection;

use super::{SchemaError, run_migration_step};

/// Dataset bookkeeping table.
pub const DATASET_TABLE: &str = "t_ili2db_dataset";

/// Basket bookkeeping table.
pub const BASKET_TABLE: &str = "t_ili2db_basket";

/// Every table of the exchange schema holding `t_id` values.
pub fn exchange_tables() -> impl Iterator<Item = &'static str> {
    [DATASET_TABLE, BASKET_TABLE, TEXT_POSITION_TABLE]
        .into_iter()
        .chain(RULES.iter().map(|rule| rule.exchange_table))
}

fn column_type(field: &FieldRule) -> &'static str {
    match field.kind {
        FieldKind::Reference { .. } => " INTEGER",
        FieldKind::Text { .. } | FieldKind::Code { .. } | FieldKind::Organisation => " TEXT",
        FieldKind::Plain => "",
    }
}

fn entity_table_sql(table: &str, fields: impl Iterator<Item = &'static FieldRule>) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    t_id INTEGER PRIMARY KEY,\n    \
         t_basket INTEGER NOT NULL REFERENCES {BASKET_TABLE} (t_id),\n    \
         t_type TEXT,\n    t_ili_tid TEXT"
    );
    for field in fields {
        sql.push_str(&format!(",\n    {}{}", field.target, column_type(field)));
    }
    sql.push_str("\n);");
    sql
}

/// Create the exchange tables if they do not exist yet.
///
/// When `recreate` is set, existing exchange tables are dropped first.
///
/// # Errors
/// Returns [`SchemaError::Migration`] naming the failing table.
pub fn create_exchange_schema(connection: &Connection, recreate: bool) -> Result<(), SchemaError> {
    if recreate {
        drop_exchange_schema(connection)?;
    }
    run_migration_step(
        connection,
        "create t_ili2db_dataset",
        "CREATE TABLE IF NOT EXISTS t_ili2db_dataset (
            t_id INTEGER PRIMARY KEY,
            datasetname TEXT NOT NULL
        );",
    )?;
    run_migration_step(
        connection,
        "create t_ili2db_basket",
        "CREATE TABLE IF NOT EXISTS t_ili2db_basket (
            t_id INTEGER PRIMARY KEY,
            dataset INTEGER REFERENCES t_ili2db_dataset (t_id),
            topic TEXT NOT NULL,
            t_ili_tid TEXT,
            attachmentkey TEXT NOT NULL
        );",
    )?;
    for rule in RULES {
        let sql = entity_table_sql(rule.exchange_table, rule.fields());
        run_migration_step(connection, rule.exchange_table, &sql)?;
    }
    run_migration_step(
        connection,
        TEXT_POSITION_TABLE,
        "CREATE TABLE IF NOT EXISTS text_position (
            t_id INTEGER PRIMARY KEY,
            t_basket INTEGER NOT NULL REFERENCES t_ili2db_basket (t_id),
            t_type TEXT,
            t_ili_tid TEXT,
            plaintext TEXT,
            textpos,
            textori REAL,
            labelled_object INTEGER
        );",
    )?;
    debug!("exchange schema ready");
    Ok(())
}

/// Drop every exchange table.
///
/// # Errors
/// Returns [`SchemaError::Migration`] when a drop fails.
pub fn drop_exchange_schema(connection: &Connection) -> Result<(), SchemaError> {
    let tables: Vec<&str> = exchange_tables().collect();
    for table in tables.into_iter().rev() {
        run_migration_step(
            connection,
            "drop exchange table",
            &format!("DROP TABLE IF EXISTS {table};"),
        )?;
    }
    Ok(())
}
