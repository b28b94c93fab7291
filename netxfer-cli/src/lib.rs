//! Command-line interface for sewer-network exchange runs.
//!
//! `netxfer export` maps an application database into a validated transfer
//! file; `netxfer import` reads one back. Options layer CLI flags over
//! `NETXFER_*` environment variables and configuration files.
#![forbid(unsafe_code)]

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use netxfer_data::fs::file_is_file;

mod error;
mod export;
mod import;
mod options;
mod summary;

pub use error::CliError;

use export::{ExportArgs, run_export};
use import::{ImportArgs, run_import};

const ARG_SOURCE: &str = "source";
const ARG_OUTPUT: &str = "output";
const ARG_INPUT: &str = "input";
const ARG_TARGET: &str = "target";
const ARG_EXCHANGE: &str = "exchange";
const ARG_SELECT: &str = "select";
const ARG_LABELS: &str = "labels";
const ARG_DATASET: &str = "dataset";
const ARG_MODEL: &str = "model";
const ARG_CLOSURE: &str = "closure";
const ARG_VALIDATION: &str = "validation";
const ARG_LABEL_ORIENTATION: &str = "label-orientation";
const ARG_TRANSFER_TOOL: &str = "transfer-tool";
const ARG_VALIDATOR: &str = "validator";
const ENV_EXPORT_SOURCE: &str = "NETXFER_CMDS_EXPORT_SOURCE";
const ENV_EXPORT_OUTPUT: &str = "NETXFER_CMDS_EXPORT_OUTPUT";
const ENV_IMPORT_INPUT: &str = "NETXFER_CMDS_IMPORT_INPUT";
const ENV_IMPORT_TARGET: &str = "NETXFER_CMDS_IMPORT_TARGET";

/// Run the netxfer CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments, configuration or the run fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Export(args) => run_export(args),
        Command::Import(args) => run_import(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "netxfer",
    about = "Exchange sewer-network data through validated transfer files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export application data into a transfer file.
    Export(ExportArgs),
    /// Import a transfer file into the application database.
    Import(ImportArgs),
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) if path.exists() => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
