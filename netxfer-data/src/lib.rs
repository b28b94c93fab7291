//! SQLite adapters and run orchestration for the exchange mapping engine.
//!
//! Responsibilities:
//! - Create the application and exchange schemas.
//! - Feed the mapping engine from the application database and persist its
//!   output into the exchange database, and the reverse.
//! - Drive the external schema, transfer-file and validation tools.
//!
//! Boundaries:
//! - Mapping rules and selection semantics live in `netxfer-core`.
//! - Transfer files are only ever touched through [`tools::ExchangeTools`].
//!
//! Invariants:
//! - Every export and import is a single transaction on its target database.
//! - No global mutable state.

pub mod export;
pub mod fs;
pub mod import;
pub mod labels;
pub mod pipeline;
pub mod schema;
pub mod source;
mod sql;
pub mod store;
pub mod tools;

pub use export::{ExportError, ExportReport, ExportRequest, export_to_exchange};
pub use import::{ImportError, ImportReport, import_from_exchange};
pub use labels::{LabelsError, read_labels};
pub use pipeline::{ExportJob, ImportJob, PipelineError, run_export, run_import};
pub use schema::{SchemaError, create_application_schema, create_exchange_schema};
pub use source::{SourceError, SourceReader};
pub use store::{SqliteInstanceStore, StoreError};
pub use tools::{CommandTools, ExchangeTools, ToolCommand, ToolError};
