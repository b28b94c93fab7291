//! [`InstanceStore`] backed by the application schema.
//!
//! An instance spans the supertype and leaf tables of its rule. Writes use
//! `INSERT ... ON CONFLICT (obj_id) DO UPDATE`, so rewriting an instance
//! never duplicates it.

use log::trace;
use netxfer_core::rules::MappingRule;
use netxfer_core::{Attributes, EntityType, InstanceStore, StagedInstance, Value, rule_for};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use thiserror::Error;

use crate::sql::{from_sql, placeholders, to_sql};

/// Errors raised by [`SqliteInstanceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No rule maps the entity type.
    #[error("no mapping rule describes {entity}")]
    UnknownEntity {
        /// Entity type requested.
        entity: EntityType,
    },
    /// The rule has no column with the requested name.
    #[error("{entity} has no column {column}")]
    UnknownColumn {
        /// Entity type requested.
        entity: EntityType,
        /// Column requested.
        column: &'static str,
    },
    /// A statement failed.
    #[error("failed to {operation} {table}")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Table involved.
        table: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

fn sqlite_error(
    operation: &'static str,
    table: &'static str,
) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite {
        operation,
        table,
        source,
    }
}

/// Application database seen as an instance store.
#[derive(Debug, Clone, Copy)]
pub struct SqliteInstanceStore<'c> {
    connection: &'c Connection,
}

impl<'c> SqliteInstanceStore<'c> {
    /// Wrap an open connection, usually an import transaction.
    pub const fn new(connection: &'c Connection) -> Self {
        Self { connection }
    }

    /// Number of rows in the leaf table of `entity`.
    ///
    /// # Errors
    /// [`StoreError::UnknownEntity`] or a failed count.
    pub fn count(&self, entity: EntityType) -> Result<usize, StoreError> {
        let rule = lookup(entity)?;
        let table = rule.leaf_table;
        let count: i64 = self
            .connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(sqlite_error("count", table))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn load_table(
        &self,
        rule: &MappingRule,
        table: &'static str,
        key: &str,
    ) -> Result<Option<Attributes>, StoreError> {
        let fields = rule.fields_in_table(table);
        let mut sql = String::from("SELECT obj_id");
        for field in &fields {
            sql.push_str(", ");
            sql.push_str(field.source);
        }
        sql.push_str(&format!(" FROM {table} WHERE obj_id = ?1"));
        let mut statement = self
            .connection
            .prepare_cached(&sql)
            .map_err(sqlite_error("prepare a read of", table))?;
        statement
            .query_row(params![key], |row| {
                let mut attributes = Attributes::new();
                for (index, field) in fields.iter().enumerate() {
                    attributes.insert(field.source, from_sql(row.get_ref(index + 1)?));
                }
                Ok(attributes)
            })
            .optional()
            .map_err(sqlite_error("read", table))
    }

    fn write_table(
        &self,
        rule: &MappingRule,
        table: &'static str,
        instance: &StagedInstance,
    ) -> Result<(), StoreError> {
        let fields = rule.fields_in_table(table);
        let columns: Vec<&str> = fields.iter().map(|field| field.source).collect();
        let conflict = if columns.is_empty() {
            String::from("DO NOTHING")
        } else {
            let updates: Vec<String> = columns
                .iter()
                .map(|column| format!("{column} = excluded.{column}"))
                .collect();
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let column_list = std::iter::once("obj_id")
            .chain(columns.iter().copied())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({column_list}) VALUES ({}) ON CONFLICT (obj_id) {conflict}",
            placeholders(1, columns.len() + 1)
        );
        let values = std::iter::once(rusqlite::types::Value::Text(instance.key.clone())).chain(
            columns.iter().map(|column| {
                instance
                    .attributes
                    .get(column)
                    .map_or(rusqlite::types::Value::Null, to_sql)
            }),
        );
        let mut statement = self
            .connection
            .prepare_cached(&sql)
            .map_err(sqlite_error("prepare an upsert into", table))?;
        statement
            .execute(params_from_iter(values))
            .map_err(sqlite_error("upsert into", table))?;
        trace!("wrote {} {} to {table}", instance.entity, instance.key);
        Ok(())
    }
}

fn lookup(entity: EntityType) -> Result<&'static MappingRule, StoreError> {
    rule_for(entity).ok_or(StoreError::UnknownEntity { entity })
}

impl InstanceStore for SqliteInstanceStore<'_> {
    type Error = StoreError;

    fn load(&self, entity: EntityType, key: &str) -> Result<Option<Attributes>, Self::Error> {
        let rule = lookup(entity)?;
        let Some(mut attributes) = self.load_table(rule, rule.leaf_table, key)? else {
            return Ok(None);
        };
        if let Some(parent) = rule.parent_table {
            match self.load_table(rule, parent, key)? {
                Some(inherited) => attributes.extend(inherited),
                None => return Ok(None),
            }
        }
        Ok(Some(attributes))
    }

    fn find_key_by(
        &self,
        entity: EntityType,
        column: &'static str,
        value: &Value,
    ) -> Result<Option<String>, Self::Error> {
        let rule = lookup(entity)?;
        let table = rule
            .table_of(column)
            .ok_or(StoreError::UnknownColumn { entity, column })?;
        let sql = if table == rule.leaf_table {
            format!("SELECT obj_id FROM {table} WHERE {column} = ?1 ORDER BY obj_id LIMIT 1")
        } else {
            format!(
                "SELECT l.obj_id FROM {} l JOIN {table} p ON p.obj_id = l.obj_id \
                 WHERE p.{column} = ?1 ORDER BY l.obj_id LIMIT 1",
                rule.leaf_table
            )
        };
        let mut statement = self
            .connection
            .prepare_cached(&sql)
            .map_err(sqlite_error("prepare a search of", table))?;
        statement
            .query_row([to_sql(value)], |row| row.get(0))
            .optional()
            .map_err(sqlite_error("search", table))
    }

    fn write(&mut self, instance: &StagedInstance) -> Result<(), Self::Error> {
        let rule = lookup(instance.entity)?;
        for table in rule.tables() {
            self.write_table(rule, table, instance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_application_schema;
    use netxfer_core::InstanceState;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> Connection {
        let connection = Connection::open_in_memory()
            .unwrap_or_else(|err| panic!("failed to open in-memory database: {err}"));
        create_application_schema(&connection)
            .unwrap_or_else(|err| panic!("failed to create schema: {err}"));
        connection
    }

    fn manhole(identifier: &str) -> StagedInstance {
        StagedInstance {
            entity: EntityType::Manhole,
            key: "S1".to_owned(),
            attributes: Attributes::from([
                ("identifier", Value::from(identifier)),
                ("depth", Value::Integer(2400)),
            ]),
            state: InstanceState::Created,
        }
    }

    #[rstest]
    fn writes_span_supertype_and_leaf(database: Connection) {
        let mut store = SqliteInstanceStore::new(&database);
        store
            .write(&manhole("MH 1"))
            .unwrap_or_else(|err| panic!("write failed: {err}"));
        let loaded = store
            .load(EntityType::Manhole, "S1")
            .unwrap_or_else(|err| panic!("load failed: {err}"));
        let Some(attributes) = loaded else {
            panic!("manhole should exist");
        };
        assert_eq!(attributes.get("identifier"), Some(&Value::from("MH 1")));
        assert_eq!(attributes.get("depth"), Some(&Value::Integer(2400)));
        assert_eq!(attributes.get("remark"), Some(&Value::Null));
    }

    #[rstest]
    fn rewrites_update_in_place(database: Connection) {
        let mut store = SqliteInstanceStore::new(&database);
        for identifier in ["MH 1", "MH 1a"] {
            store
                .write(&manhole(identifier))
                .unwrap_or_else(|err| panic!("write failed: {err}"));
        }
        assert!(matches!(store.count(EntityType::Manhole), Ok(1)));
        let found = store.find_key_by(EntityType::Manhole, "identifier", &Value::from("MH 1a"));
        assert_eq!(found.ok().flatten().as_deref(), Some("S1"));
    }

    #[rstest]
    fn missing_instances_load_as_none(database: Connection) {
        let store = SqliteInstanceStore::new(&database);
        assert!(matches!(store.load(EntityType::Reach, "R404"), Ok(None)));
    }
}
