//! Facade crate for the netxfer exchange engine.
//!
//! This crate re-exports the mapping engine and, behind the `store-sqlite`
//! feature, the SQLite adapters and end-to-end export and import runs.

#![forbid(unsafe_code)]

pub use netxfer_core::{
    Basket, ClosureStrategy, ExchangeConfig, Label, MappingError, MappingWarning, ModelVariant,
    NetworkSnapshot, Selection, Tid, Topic, ValidationPolicy, Value, ValueLists, resolve_closure,
};

#[cfg(feature = "store-sqlite")]
pub use netxfer_data::{
    CommandTools, ExchangeTools, ExportJob, ExportReport, ImportJob, ImportReport, PipelineError,
    SqliteInstanceStore, export_to_exchange, import_from_exchange, run_export, run_import,
};
