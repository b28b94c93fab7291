//! Import of exchange rows into the application schema.
//!
//! The whole import runs in one transaction on the application database with
//! foreign key checks deferred to commit. Rows are written in rule order as
//! they are mapped; a dangling key anywhere in the run makes the commit fail
//! and leaves the database untouched.

use std::collections::BTreeMap;

use log::{debug, info};
use netxfer_core::rules::MappingRule;
use netxfer_core::{
    Attributes, ExchangeConfig, ImportRun, MappingWarning, NaturalKeys, ReferenceResolver,
    UpsertResolver, rules_for_topic,
};
use rusqlite::{Connection, Row};
use thiserror::Error;

use crate::source::{SourceError, SourceReader};
use crate::sql::from_sql;
use crate::store::{SqliteInstanceStore, StoreError};

/// Errors raised by [`import_from_exchange`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// Value lists of the target could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// An exchange row carries no natural key.
    #[error("row {tid} of {table} has no t_ili_tid")]
    MissingNaturalKey {
        /// Exchange table of the row.
        table: &'static str,
        /// `t_id` of the row.
        tid: i64,
    },
    /// Writing an instance failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A statement failed.
    #[error("failed to {operation} during import")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
    /// Deferred constraint checks failed; the import was rolled back.
    #[error("import rolled back: the imported rows violate the application schema")]
    Commit {
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

fn sqlite_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> ImportError {
    move |source| ImportError::Sqlite { operation, source }
}

/// Summary of a committed import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Instances new to the target, including created organisations.
    pub created: usize,
    /// Instances that already existed in the target.
    pub updated: usize,
    /// Exchange rows read per table.
    pub rows: BTreeMap<&'static str, usize>,
    /// Warnings raised while mapping.
    pub warnings: Vec<MappingWarning>,
}

struct ExchangeRecord {
    key: String,
    columns: Attributes,
}

/// Import the exchange database `exchange` into the application database
/// `target`.
///
/// Instances are matched by natural key: rows already present are updated,
/// so importing the same exchange data twice leaves the instance counts
/// unchanged. Text positions are not imported.
///
/// # Errors
/// Any failure rolls the application transaction back; see [`ImportError`].
pub fn import_from_exchange(
    exchange: &Connection,
    target: &mut Connection,
    config: &ExchangeConfig,
) -> Result<ImportReport, ImportError> {
    let value_lists = SourceReader::new(target).value_lists()?;
    let rules: Vec<&'static MappingRule> = config
        .model
        .topics()
        .iter()
        .flat_map(|&topic| rules_for_topic(topic))
        .collect();
    let keys = natural_keys(exchange, &rules)?;
    debug!("resolved {} natural keys", keys.len());

    target
        .pragma_update(None, "foreign_keys", true)
        .map_err(sqlite_error("enable foreign keys"))?;
    let tx = target
        .transaction()
        .map_err(sqlite_error("begin the import transaction"))?;
    tx.pragma_update(None, "defer_foreign_keys", true)
        .map_err(sqlite_error("defer foreign keys"))?;

    let mut store = SqliteInstanceStore::new(&tx);
    let mut upserts = UpsertResolver::new();
    let mut organisations = ReferenceResolver::organisations();
    let mut run = ImportRun::new(&value_lists, &keys);
    let mut report = ImportReport::default();

    for rule in rules {
        let records = read_records(exchange, rule)?;
        report.rows.insert(rule.exchange_table, records.len());
        for record in records {
            let attributes = run.map_row(rule, &record.key, record.columns, |name| {
                organisations
                    .resolve_or_create_reference(&mut upserts, &store, name)
                    .map_err(ImportError::from)
            })?;
            upserts.upsert(&store, rule.entity, &record.key, attributes)?;
        }
        let written = upserts.flush(&mut store)?;
        debug!("wrote {written} instances after {} rows", rule.entity);
    }

    tx.commit().map_err(|source| ImportError::Commit { source })?;
    report.created = upserts.created();
    report.updated = upserts.updated();
    report.warnings = run.into_diagnostics().into_warnings();
    info!(
        "import committed: {} created, {} updated, {} warnings",
        report.created,
        report.updated,
        report.warnings.len()
    );
    Ok(report)
}

fn natural_keys(
    exchange: &Connection,
    rules: &[&'static MappingRule],
) -> Result<NaturalKeys, ImportError> {
    let mut keys = NaturalKeys::default();
    for rule in rules {
        let table = rule.exchange_table;
        let mut statement = exchange
            .prepare_cached(&format!("SELECT t_id, t_ili_tid FROM {table}"))
            .map_err(sqlite_error("read natural keys"))?;
        let rows = statement
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .map_err(sqlite_error("read natural keys"))?;
        for row in rows {
            let (tid, key) = row.map_err(sqlite_error("read natural keys"))?;
            let key = key.ok_or(ImportError::MissingNaturalKey { table, tid })?;
            keys.insert(tid, key);
        }
    }
    Ok(keys)
}

fn read_records(
    exchange: &Connection,
    rule: &MappingRule,
) -> Result<Vec<ExchangeRecord>, ImportError> {
    let table = rule.exchange_table;
    let fields: Vec<_> = rule.fields().collect();
    let mut sql = String::from("SELECT t_id, t_ili_tid");
    for field in &fields {
        sql.push_str(", ");
        sql.push_str(field.target);
    }
    sql.push_str(&format!(" FROM {table} ORDER BY t_id"));

    let mut statement = exchange
        .prepare_cached(&sql)
        .map_err(sqlite_error("read exchange rows"))?;
    let rows = statement
        .query_map([], |row: &Row<'_>| {
            let tid: i64 = row.get(0)?;
            let key: Option<String> = row.get(1)?;
            let mut columns = Attributes::new();
            for (index, field) in fields.iter().enumerate() {
                columns.insert(field.target, from_sql(row.get_ref(index + 2)?));
            }
            Ok((tid, key, columns))
        })
        .map_err(sqlite_error("read exchange rows"))?;

    let mut records = Vec::new();
    for row in rows {
        let (tid, key, columns) = row.map_err(sqlite_error("read exchange rows"))?;
        let key = key.ok_or(ImportError::MissingNaturalKey { table, tid })?;
        records.push(ExchangeRecord { key, columns });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{create_application_schema, create_exchange_schema};
    use netxfer_core::{EntityType, ModelVariant};
    use rstest::{fixture, rstest};

    #[fixture]
    fn target() -> Connection {
        let connection = Connection::open_in_memory()
            .unwrap_or_else(|err| panic!("failed to open target database: {err}"));
        create_application_schema(&connection)
            .unwrap_or_else(|err| panic!("failed to create application schema: {err}"));
        connection
    }

    fn exchange(rows: &str) -> Connection {
        let connection = Connection::open_in_memory()
            .unwrap_or_else(|err| panic!("failed to open exchange database: {err}"));
        create_exchange_schema(&connection, false)
            .unwrap_or_else(|err| panic!("failed to create exchange schema: {err}"));
        connection
            .execute_batch(rows)
            .unwrap_or_else(|err| panic!("failed to seed exchange: {err}"));
        connection
    }

    fn count(target: &Connection, entity: EntityType) -> usize {
        SqliteInstanceStore::new(target)
            .count(entity)
            .unwrap_or_else(|err| panic!("failed to count {entity}: {err}"))
    }

    #[rstest]
    fn rows_without_natural_keys_are_rejected(mut target: Connection) {
        let exchange = exchange("INSERT INTO wastewater_node (t_id, t_basket) VALUES (5, 1);");
        let result = import_from_exchange(&exchange, &mut target, &ExchangeConfig::default());
        assert!(matches!(
            result,
            Err(ImportError::MissingNaturalKey {
                table: "wastewater_node",
                tid: 5
            })
        ));
    }

    #[rstest]
    fn constraint_violations_roll_everything_back(mut target: Connection) {
        let exchange = exchange(
            "INSERT INTO wastewater_node (t_id, t_basket, t_ili_tid, identifier) VALUES (2, 1, 'A', 'A');
             INSERT INTO examination (t_id, t_basket, t_ili_tid, identifier) VALUES (3, 1, 'E1', 'E 1');
             INSERT INTO reach (t_id, t_basket, t_ili_tid, identifier, from_element)
                 VALUES (4, 1, 'R1', 'R 1', 3);",
        );
        let config = ExchangeConfig::default().with_model(ModelVariant::WastewaterInspection);
        let result = import_from_exchange(&exchange, &mut target, &config);
        assert!(matches!(result, Err(ImportError::Commit { .. })));
        assert_eq!(count(&target, EntityType::WastewaterNode), 0);
        assert_eq!(count(&target, EntityType::Reach), 0);
    }

    #[rstest]
    fn dangling_tids_import_as_null(mut target: Connection) {
        let exchange = exchange(
            "INSERT INTO reach (t_id, t_basket, t_ili_tid, identifier, to_element)
                 VALUES (4, 1, 'R1', 'R 1', 99);",
        );
        let report = import_from_exchange(&exchange, &mut target, &ExchangeConfig::default())
            .unwrap_or_else(|err| panic!("import failed: {err}"));
        assert_eq!(report.created, 1);
        assert!(matches!(
            report.warnings.as_slice(),
            [MappingWarning::DanglingReference { field: "fk_to", .. }]
        ));
    }

    #[rstest]
    fn structure_parts_of_missing_structures_lose_their_owner(mut target: Connection) {
        let exchange = exchange(
            "INSERT INTO cover (t_id, t_basket, t_ili_tid, identifier, wastewater_structure)
                 VALUES (5, 1, 'CV5', 'D 5', 99);",
        );
        let report = import_from_exchange(&exchange, &mut target, &ExchangeConfig::default())
            .unwrap_or_else(|err| panic!("import failed: {err}"));
        assert_eq!(report.created, 1);
        assert!(matches!(
            report.warnings.as_slice(),
            [MappingWarning::DanglingReference { key, field: "fk_wastewater_structure", .. }]
                if key == "CV5"
        ));
        assert_eq!(count(&target, EntityType::Cover), 1);
        let owner: Option<String> = target
            .query_row(
                "SELECT fk_wastewater_structure FROM od_structure_part WHERE obj_id = 'CV5'",
                [],
                |row| row.get(0),
            )
            .unwrap_or_else(|err| panic!("failed to read structure part: {err}"));
        assert_eq!(owner, None);
    }
}
