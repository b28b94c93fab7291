//! Schema management for the application and exchange databases.
//!
//! The application schema stores the live asset data; its foreign keys are
//! deferred so that imports may write rows in any order and rely on a single
//! check at commit. The exchange schema mirrors the layout generated by the
//! transfer tooling: one table per entity type plus dataset, basket and text
//! position bookkeeping, keyed by integer `t_id`.

mod application;
mod exchange;

pub use application::create_application_schema;
pub use exchange::{
    BASKET_TABLE, DATASET_TABLE, create_exchange_schema, drop_exchange_schema, exchange_tables,
};

use rusqlite::Connection;
use thiserror::Error;

/// Errors raised while creating or dropping schema objects.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A migration step failed.
    #[error("schema migration step '{step}' failed")]
    Migration {
        /// Human-readable label for the failing step.
        step: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

fn run_migration_step(
    connection: &Connection,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    connection
        .execute_batch(sql)
        .map_err(|source| SchemaError::Migration { step, source })
}
