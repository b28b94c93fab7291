//! Export of application rows into the exchange schema.
//!
//! One export is one SQLite transaction on the exchange database: the
//! dataset, its baskets and every mapped row are committed together, or not
//! at all when the mapping fails.

use std::collections::BTreeMap;

use camino::Utf8Path;
use log::{debug, info};
use netxfer_core::{
    Basket, ExchangeConfig, ExchangeRow, ExportRun, MappingError, MappingWarning, Selection, Tid,
    TidTranslator, Topic, resolve_closure, rules_for_topic,
};
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use thiserror::Error;

use crate::labels::{LabelsError, read_labels};
use crate::schema::{
    BASKET_TABLE, DATASET_TABLE, SchemaError, create_exchange_schema, exchange_tables,
};
use crate::source::{SourceError, SourceReader};
use crate::sql::{placeholders, to_sql};

/// Errors raised by [`export_to_exchange`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// The exchange schema could not be prepared.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The application schema could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The label file could not be read.
    #[error(transparent)]
    Labels(#[from] LabelsError),
    /// The mapping failed structurally; nothing was written.
    #[error("export mapping failed")]
    Mapping(#[from] MappingError),
    /// A statement against the exchange database failed.
    #[error("failed to {operation} in the exchange database")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

fn sqlite_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> ExportError {
    move |source| ExportError::Sqlite { operation, source }
}

/// Inputs of one export beyond the databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportRequest<'a> {
    /// Elements to export; `None` exports the whole dataset.
    pub selection: Option<&'a Selection>,
    /// Optional label file exported as text positions.
    pub labels: Option<&'a Utf8Path>,
}

/// Summary of a committed export.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Rows written per exchange table.
    pub rows: BTreeMap<&'static str, usize>,
    /// Baskets created by the run.
    pub baskets: Vec<Basket>,
    /// Reaches between selected endpoints that were left out.
    pub extra_reaches: usize,
    /// Warnings raised while mapping.
    pub warnings: Vec<MappingWarning>,
}

impl ExportReport {
    /// Rows written to `table`.
    pub fn rows_in(&self, table: &str) -> usize {
        self.rows.get(table).copied().unwrap_or_default()
    }
}

/// Export the application database `source` into the exchange database
/// `target`.
///
/// TIDs continue after the largest `t_id` already present in `target`, so
/// repeated exports into one database never collide.
///
/// # Errors
/// Any failure rolls the exchange transaction back; see [`ExportError`].
///
/// # Examples
/// ```no_run
/// use netxfer_core::{ExchangeConfig, Selection};
/// use netxfer_data::{ExportRequest, export_to_exchange};
/// use rusqlite::Connection;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = Connection::open("network.sqlite")?;
/// let mut target = Connection::open("exchange.gpkg")?;
/// let selection: Selection = ["R1"].into_iter().collect();
/// let request = ExportRequest { selection: Some(&selection), labels: None };
/// let report = export_to_exchange(&source, &mut target, &ExchangeConfig::default(), &request)?;
/// println!("exported {} reaches", report.rows_in("reach"));
/// # Ok(())
/// # }
/// ```
pub fn export_to_exchange(
    source: &Connection,
    target: &mut Connection,
    config: &ExchangeConfig,
    request: &ExportRequest<'_>,
) -> Result<ExportReport, ExportError> {
    let reader = SourceReader::new(source);
    let snapshot = reader.snapshot()?;
    let value_lists = reader.value_lists()?;
    let organisations = reader.organisation_names()?;
    let selection = resolve_closure(&snapshot, request.selection, &config.closure);
    let mut labels = request.labels.map(read_labels).transpose()?;

    let tx = target
        .transaction()
        .map_err(sqlite_error("begin the export transaction"))?;
    create_exchange_schema(&tx, false)?;

    let dataset = Tid::new(next_free_tid(&tx)?);
    let translator = TidTranslator::starting_at(dataset.get() + 1);
    let mut run = ExportRun::new(config, &selection, &value_lists, &organisations, translator);
    insert_dataset(&tx, dataset, &config.dataset)?;
    for basket in run.baskets() {
        insert_basket(&tx, dataset, basket)?;
    }

    let mut report = ExportReport {
        extra_reaches: selection.extra_reaches,
        ..ExportReport::default()
    };
    for &topic in config.model.topics() {
        run.begin_topic(topic).map_err(MappingError::from)?;
        for rule in rules_for_topic(topic) {
            let mut written = 0;
            for record in reader.records(rule)? {
                if !run.admits(rule, &record) {
                    continue;
                }
                let row = run.map_row(rule, record)?;
                insert_row(&tx, &row)?;
                written += 1;
            }
            debug!("exported {written} {} rows", rule.entity);
            *report.rows.entry(rule.exchange_table).or_default() += written;
        }
        if topic == Topic::Wastewater {
            for label in labels.take().into_iter().flatten() {
                if let Some(row) = run.map_label(label)? {
                    insert_row(&tx, &row)?;
                    *report.rows.entry(row.table).or_default() += 1;
                }
            }
        }
    }

    let outcome = run.finish()?;
    tx.commit()
        .map_err(sqlite_error("commit the export transaction"))?;
    info!(
        "export committed: {} rows in {} baskets, {} warnings",
        report.rows.values().sum::<usize>(),
        outcome.baskets.len(),
        outcome.diagnostics.len()
    );
    report.baskets = outcome.baskets;
    report.warnings = outcome.diagnostics.into_warnings();
    Ok(report)
}

fn next_free_tid(tx: &Transaction<'_>) -> Result<i64, ExportError> {
    let mut highest = 0_i64;
    for table in exchange_tables() {
        let max: Option<i64> = tx
            .query_row(&format!("SELECT MAX(t_id) FROM {table}"), [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(sqlite_error("read the highest t_id"))?
            .flatten();
        highest = highest.max(max.unwrap_or_default());
    }
    Ok(highest + 1)
}

fn insert_dataset(tx: &Transaction<'_>, dataset: Tid, name: &str) -> Result<(), ExportError> {
    tx.execute(
        &format!("INSERT INTO {DATASET_TABLE} (t_id, datasetname) VALUES (?1, ?2)"),
        params![dataset.get(), name],
    )
    .map_err(sqlite_error("insert the dataset"))?;
    Ok(())
}

fn insert_basket(tx: &Transaction<'_>, dataset: Tid, basket: &Basket) -> Result<(), ExportError> {
    tx.execute(
        &format!(
            "INSERT INTO {BASKET_TABLE} (t_id, dataset, topic, t_ili_tid, attachmentkey)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            basket.tid.get(),
            dataset.get(),
            basket.topic.name(),
            basket.tid.get().to_string(),
            basket.dataset,
        ],
    )
    .map_err(sqlite_error("insert a basket"))?;
    Ok(())
}

fn insert_row(tx: &Transaction<'_>, row: &ExchangeRow) -> Result<(), ExportError> {
    let mut columns = String::from("t_id, t_basket, t_type, t_ili_tid");
    let mut values = vec![
        rusqlite::types::Value::Integer(row.tid.get()),
        rusqlite::types::Value::Integer(row.basket.get()),
        rusqlite::types::Value::Text(row.type_tag.to_owned()),
        row.natural_key
            .clone()
            .map_or(rusqlite::types::Value::Null, rusqlite::types::Value::Text),
    ];
    for (column, value) in &row.columns {
        columns.push_str(", ");
        columns.push_str(column);
        values.push(to_sql(value));
    }
    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({})",
        row.table,
        placeholders(1, values.len())
    );
    let mut statement = tx
        .prepare_cached(&sql)
        .map_err(sqlite_error("prepare a row insert"))?;
    statement
        .execute(params_from_iter(values))
        .map_err(sqlite_error("insert an exchange row"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_application_schema;
    use netxfer_core::{ClosureStrategy, Value};
    use rstest::{fixture, rstest};

    const NETWORK: &str = "
        INSERT INTO vl_entry VALUES ('reach_material', 5081, 'concrete');
        INSERT INTO od_organisation (obj_id, identifier) VALUES ('org-1', 'Stadt Bern');
        INSERT INTO od_wastewater_structure (obj_id, identifier, fk_owner) VALUES ('S1', 'MH 1', 'org-1');
        INSERT INTO od_manhole (obj_id) VALUES ('S1');
        INSERT INTO od_wastewater_networkelement (obj_id, identifier, fk_wastewater_structure)
            VALUES ('A', 'A', 'S1'), ('B', 'B', NULL), ('C', 'C', NULL), ('R1', 'R 1', NULL), ('R2', 'R 2', NULL);
        INSERT INTO od_wastewater_node (obj_id) VALUES ('A'), ('B'), ('C');
        INSERT INTO od_reach (obj_id, material, fk_from, fk_to)
            VALUES ('R1', 5081, 'A', 'B'), ('R2', 9999, 'B', 'C');
    ";

    #[fixture]
    fn source() -> Connection {
        let connection = Connection::open_in_memory()
            .unwrap_or_else(|err| panic!("failed to open source database: {err}"));
        create_application_schema(&connection)
            .unwrap_or_else(|err| panic!("failed to create schema: {err}"));
        connection
            .execute_batch(NETWORK)
            .unwrap_or_else(|err| panic!("failed to seed source: {err}"));
        connection
    }

    #[fixture]
    fn target() -> Connection {
        Connection::open_in_memory()
            .unwrap_or_else(|err| panic!("failed to open exchange database: {err}"))
    }

    fn export(
        source: &Connection,
        target: &mut Connection,
        keys: Option<&[&str]>,
    ) -> Result<ExportReport, ExportError> {
        let selection: Option<Selection> = keys.map(|keys| keys.iter().copied().collect());
        let request = ExportRequest {
            selection: selection.as_ref(),
            labels: None,
        };
        let config = ExchangeConfig::default().with_closure_strategy(ClosureStrategy::SinglePass);
        export_to_exchange(source, target, &config, &request)
    }

    fn column(target: &Connection, sql: &str) -> Value {
        target
            .query_row(sql, [], |row| row.get_ref(0).map(crate::sql::from_sql))
            .unwrap_or_else(|err| panic!("query {sql} failed: {err}"))
    }

    #[rstest]
    fn partial_export_writes_the_closure(source: Connection, mut target: Connection) {
        let report = export(&source, &mut target, Some(&["R1"]))
            .unwrap_or_else(|err| panic!("export failed: {err}"));
        assert_eq!(report.rows_in("reach"), 1);
        assert_eq!(report.rows_in("wastewater_node"), 2);
        assert_eq!(report.rows_in("manhole"), 1);
        assert_eq!(report.rows_in("text_position"), 0);
        assert_eq!(
            column(&target, "SELECT material FROM reach WHERE t_ili_tid = 'R1'"),
            Value::from("concrete")
        );
        assert_eq!(
            column(&target, "SELECT owner FROM manhole WHERE t_ili_tid = 'S1'"),
            Value::from("Stadt Bern")
        );
    }

    #[rstest]
    fn references_use_exchange_tids(source: Connection, mut target: Connection) {
        export(&source, &mut target, Some(&["R1"]))
            .unwrap_or_else(|err| panic!("export failed: {err}"));
        assert_eq!(
            column(
                &target,
                "SELECT n.t_ili_tid FROM reach r JOIN wastewater_node n ON n.t_id = r.to_element"
            ),
            Value::from("B")
        );
    }

    #[rstest]
    fn value_list_misses_are_reported(source: Connection, mut target: Connection) {
        let report = export(&source, &mut target, None)
            .unwrap_or_else(|err| panic!("export failed: {err}"));
        assert_eq!(report.rows_in("reach"), 2);
        assert!(report.warnings.iter().any(|warning| matches!(
            warning,
            MappingWarning::ValueListMiss { key, .. } if key == "R2"
        )));
    }

    #[rstest]
    fn repeated_exports_continue_tids(source: Connection, mut target: Connection) {
        let first = export(&source, &mut target, Some(&["R1"]))
            .unwrap_or_else(|err| panic!("first export failed: {err}"));
        let second = export(&source, &mut target, Some(&["R1"]))
            .unwrap_or_else(|err| panic!("second export failed: {err}"));
        let first_max = first.baskets.iter().map(|basket| basket.tid).max();
        let second_min = second.baskets.iter().map(|basket| basket.tid).min();
        assert!(second_min > first_max);
        assert_eq!(
            column(&target, "SELECT COUNT(*) FROM t_ili2db_dataset"),
            Value::Integer(2)
        );
    }
}
