//! Read access to the application schema.
//!
//! [`SourceReader`] loads the network topology the selection closure walks,
//! the value lists and organisation names the export translates through and
//! the joined supertype and leaf rows of each mapping rule.

use log::debug;
use netxfer_core::rules::{MappingRule, Storage};
use netxfer_core::{
    NetworkElement, NetworkSnapshot, OrganisationNames, SourceRecord, StructureKind,
    StructureRecord, ValueListEntry, ValueLists,
};
use rusqlite::{Connection, Row};
use thiserror::Error;

use crate::sql::from_sql;

/// Errors raised while reading the application schema.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A query failed.
    #[error("failed to read {operation} from the application schema")]
    Query {
        /// Data being read.
        operation: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

fn query_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> SourceError {
    move |source| SourceError::Query { operation, source }
}

const NODES_SQL: &str = "SELECT ne.obj_id, ne.fk_wastewater_structure, n.fk_overflow_to
     FROM od_wastewater_node n
     JOIN od_wastewater_networkelement ne ON ne.obj_id = n.obj_id";

const REACHES_SQL: &str = "SELECT ne.obj_id, ne.fk_wastewater_structure, r.fk_from, r.fk_to
     FROM od_reach r
     JOIN od_wastewater_networkelement ne ON ne.obj_id = r.obj_id";

/// Reader over an application database.
#[derive(Debug, Clone, Copy)]
pub struct SourceReader<'c> {
    connection: &'c Connection,
}

impl<'c> SourceReader<'c> {
    /// Wrap an open application database.
    pub const fn new(connection: &'c Connection) -> Self {
        Self { connection }
    }

    /// Load the topology of every node, reach and structure.
    ///
    /// Structures are classified by the leaf table holding their row.
    ///
    /// # Errors
    /// Returns [`SourceError::Query`] when a topology query fails.
    pub fn snapshot(&self) -> Result<NetworkSnapshot, SourceError> {
        let mut elements = self.collect(NODES_SQL, "wastewater nodes", |row| {
            let mut node = NetworkElement::node(row.get::<_, String>(0)?);
            node.structure = row.get(1)?;
            node.overflow_to = row.get(2)?;
            Ok(node)
        })?;
        elements.extend(self.collect(REACHES_SQL, "reaches", |row| {
            let mut reach = NetworkElement::reach(row.get::<_, String>(0)?, row.get(2)?, row.get(3)?);
            reach.structure = row.get(1)?;
            Ok(reach)
        })?);

        let mut structures = Vec::new();
        for kind in StructureKind::ALL {
            let sql = format!("SELECT obj_id FROM od_{}", kind.as_str());
            structures.extend(self.collect(&sql, "structures", |row| {
                Ok(StructureRecord::new(row.get::<_, String>(0)?, kind))
            })?);
        }
        debug!(
            "loaded topology of {} elements and {} structures",
            elements.len(),
            structures.len()
        );
        Ok(NetworkSnapshot::new(elements, structures))
    }

    /// Load every value list entry.
    ///
    /// # Errors
    /// Returns [`SourceError::Query`] when the query fails.
    pub fn value_lists(&self) -> Result<ValueLists, SourceError> {
        let entries = self.collect(
            "SELECT list_name, code, display FROM vl_entry",
            "value lists",
            |row| {
                Ok(ValueListEntry::new(
                    row.get::<_, String>(0)?,
                    row.get(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;
        Ok(entries.into_iter().collect())
    }

    /// Load the display names of every named organisation.
    ///
    /// # Errors
    /// Returns [`SourceError::Query`] when the query fails.
    pub fn organisation_names(&self) -> Result<OrganisationNames, SourceError> {
        let pairs = self.collect(
            "SELECT obj_id, identifier FROM od_organisation WHERE identifier IS NOT NULL",
            "organisations",
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;
        Ok(pairs.into_iter().collect())
    }

    /// Load every row of `rule`, joining the supertype and leaf tables.
    ///
    /// Rows are returned in natural key order.
    ///
    /// # Errors
    /// Returns [`SourceError::Query`] when the query fails.
    pub fn records(&self, rule: &MappingRule) -> Result<Vec<SourceRecord>, SourceError> {
        let sql = record_query(rule);
        let fields: Vec<_> = rule.fields().collect();
        self.collect(&sql, "entity rows", |row| {
            let mut record = SourceRecord::new(row.get::<_, String>(0)?);
            for (index, field) in fields.iter().enumerate() {
                let value = from_sql(row.get_ref(index + 1)?);
                record.attributes.insert(field.source, value);
            }
            Ok(record)
        })
    }

    fn collect<T>(
        &self,
        sql: &str,
        operation: &'static str,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, SourceError> {
        let mut statement = self
            .connection
            .prepare_cached(sql)
            .map_err(query_error(operation))?;
        let rows = statement
            .query_map([], map)
            .map_err(query_error(operation))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(query_error(operation))
    }
}

fn record_query(rule: &MappingRule) -> String {
    let columns: Vec<String> = rule
        .groups
        .iter()
        .flat_map(|group| {
            let alias = match (group.storage, rule.parent_table) {
                (Storage::Parent, Some(_)) => "p",
                _ => "l",
            };
            group
                .fields
                .iter()
                .map(move |field| format!("{alias}.{}", field.source))
        })
        .collect();
    let join = rule
        .parent_table
        .map(|parent| format!(" JOIN {parent} p ON p.obj_id = l.obj_id"))
        .unwrap_or_default();
    let mut select = String::from("SELECT l.obj_id");
    for column in columns {
        select.push_str(", ");
        select.push_str(&column);
    }
    format!(
        "{select} FROM {} l{join} ORDER BY l.obj_id",
        rule.leaf_table
    )
}
