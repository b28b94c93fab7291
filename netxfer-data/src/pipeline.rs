//! End-to-end export and import runs.
//!
//! An export creates the exchange schema, maps the application data into it,
//! encodes the transfer file and validates it. An import validates the
//! transfer file first, decodes it into a fresh exchange schema and maps the
//! rows into the application database. Validator failures are handled by the
//! run's [`ValidationPolicy`].

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use netxfer_core::{ExchangeConfig, Selection, ValidationPolicy};
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::export::{ExportError, ExportReport, ExportRequest, export_to_exchange};
use crate::fs::{ensure_parent_dir, file_is_file};
use crate::import::{ImportError, ImportReport, import_from_exchange};
use crate::tools::{ExchangeTools, ToolError};

/// Errors raised by [`run_export`] and [`run_import`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external tool failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// The export mapping failed.
    #[error(transparent)]
    Export(#[from] ExportError),
    /// The import mapping failed.
    #[error(transparent)]
    Import(#[from] ImportError),
    /// A database could not be opened.
    #[error("failed to open database {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
    /// An input file is missing.
    #[error("input file {path} does not exist")]
    MissingInput {
        /// Missing path.
        path: Utf8PathBuf,
    },
    /// The filesystem refused an operation.
    #[error("filesystem operation on {path} failed")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Paths and inputs of an export run.
#[derive(Debug, Clone, Copy)]
pub struct ExportJob<'a> {
    /// Application database read by the export.
    pub source: &'a Utf8Path,
    /// Exchange database, recreated by the run.
    pub exchange: &'a Utf8Path,
    /// Transfer file written by the run.
    pub output: &'a Utf8Path,
    /// Elements to export; `None` exports the whole dataset.
    pub selection: Option<&'a Selection>,
    /// Optional label file.
    pub labels: Option<&'a Utf8Path>,
}

/// Paths of an import run.
#[derive(Debug, Clone, Copy)]
pub struct ImportJob<'a> {
    /// Transfer file read by the run.
    pub input: &'a Utf8Path,
    /// Exchange database, recreated by the run.
    pub exchange: &'a Utf8Path,
    /// Application database receiving the rows.
    pub target: &'a Utf8Path,
}

/// Export the application database into a validated transfer file.
///
/// # Errors
/// See [`PipelineError`]. Validator rejections only fail the run under
/// [`ValidationPolicy::Enforce`].
pub fn run_export(
    tools: &impl ExchangeTools,
    config: &ExchangeConfig,
    job: &ExportJob<'_>,
) -> Result<ExportReport, PipelineError> {
    require_file(job.source)?;
    prepare_parent(job.exchange)?;
    let models = config.model.model_names();
    tools.create_schema(job.exchange, models, true)?;

    let source = open(job.source, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut exchange = open(job.exchange, OpenFlags::default())?;
    let request = ExportRequest {
        selection: job.selection,
        labels: job.labels,
    };
    let report = export_to_exchange(&source, &mut exchange, config, &request)?;
    drop(exchange);

    prepare_parent(job.output)?;
    tools.encode(job.exchange, models, job.output)?;
    validate(tools, job.output, config.validation)?;
    info!("exported {} to {}", job.source, job.output);
    Ok(report)
}

/// Import a transfer file into the application database.
///
/// # Errors
/// See [`PipelineError`]. Validator rejections only fail the run under
/// [`ValidationPolicy::Enforce`].
pub fn run_import(
    tools: &impl ExchangeTools,
    config: &ExchangeConfig,
    job: &ImportJob<'_>,
) -> Result<ImportReport, PipelineError> {
    require_file(job.input)?;
    validate(tools, job.input, config.validation)?;
    prepare_parent(job.exchange)?;
    tools.create_schema(job.exchange, config.model.model_names(), true)?;
    tools.decode(job.exchange, job.input)?;

    let exchange = open(job.exchange, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut target = open(job.target, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    let report = import_from_exchange(&exchange, &mut target, config)?;
    info!("imported {} into {}", job.input, job.target);
    Ok(report)
}

fn validate(
    tools: &impl ExchangeTools,
    path: &Utf8Path,
    policy: ValidationPolicy,
) -> Result<(), PipelineError> {
    match policy {
        ValidationPolicy::Skip => {
            info!("skipping validation of {path}");
            Ok(())
        }
        ValidationPolicy::Warn => {
            if let Err(err) = tools.validate(path) {
                warn!("continuing despite failed validation: {err}");
            }
            Ok(())
        }
        ValidationPolicy::Enforce => Ok(tools.validate(path)?),
    }
}

fn require_file(path: &Utf8Path) -> Result<(), PipelineError> {
    let exists = file_is_file(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if exists {
        Ok(())
    } else {
        Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}

fn prepare_parent(path: &Utf8Path) -> Result<(), PipelineError> {
    ensure_parent_dir(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn open(path: &Utf8Path, flags: OpenFlags) -> Result<Connection, PipelineError> {
    Connection::open_with_flags(path, flags).map_err(|source| PipelineError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{create_application_schema, create_exchange_schema};
    use rstest::{fixture, rstest};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Tools that create the built-in schema and record every call.
    #[derive(Default)]
    struct RecordingTools {
        calls: RefCell<Vec<&'static str>>,
        reject: bool,
    }

    impl ExchangeTools for RecordingTools {
        fn create_schema(
            &self,
            database: &Utf8Path,
            _models: &[&str],
            recreate: bool,
        ) -> Result<(), ToolError> {
            self.calls.borrow_mut().push("create_schema");
            let connection = Connection::open(database)
                .unwrap_or_else(|err| panic!("failed to open {database}: {err}"));
            create_exchange_schema(&connection, recreate)
                .unwrap_or_else(|err| panic!("failed to create exchange schema: {err}"));
            Ok(())
        }

        fn encode(&self, _: &Utf8Path, _: &[&str], output: &Utf8Path) -> Result<(), ToolError> {
            self.calls.borrow_mut().push("encode");
            std::fs::write(output, "<TRANSFER/>")
                .unwrap_or_else(|err| panic!("failed to write {output}: {err}"));
            Ok(())
        }

        fn decode(&self, _: &Utf8Path, _: &Utf8Path) -> Result<(), ToolError> {
            self.calls.borrow_mut().push("decode");
            Ok(())
        }

        fn validate(&self, path: &Utf8Path) -> Result<(), ToolError> {
            self.calls.borrow_mut().push("validate");
            if self.reject {
                return Err(ToolError::Validation {
                    path: path.to_path_buf(),
                    report: "rejected".to_owned(),
                });
            }
            Ok(())
        }
    }

    struct Workspace {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Workspace {
        fn path(&self, name: &str) -> Utf8PathBuf {
            self.root.join(name)
        }
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("temp dir: {err}"));
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non-UTF-8 temp dir {path:?}"));
        let source = Connection::open(root.join("network.sqlite"))
            .unwrap_or_else(|err| panic!("failed to create source: {err}"));
        create_application_schema(&source)
            .unwrap_or_else(|err| panic!("failed to create application schema: {err}"));
        source
            .execute_batch(
                "INSERT INTO od_wastewater_networkelement (obj_id, identifier) VALUES ('A', 'A');
                 INSERT INTO od_wastewater_node (obj_id) VALUES ('A');",
            )
            .unwrap_or_else(|err| panic!("failed to seed source: {err}"));
        Workspace { _dir: dir, root }
    }

    fn export_job(workspace: &Workspace) -> (Utf8PathBuf, Utf8PathBuf, Utf8PathBuf) {
        (
            workspace.path("network.sqlite"),
            workspace.path("exchange.gpkg"),
            workspace.path("out/transfer.xtf"),
        )
    }

    #[rstest]
    fn export_runs_every_stage(workspace: Workspace) {
        let tools = RecordingTools::default();
        let (source, exchange, output) = export_job(&workspace);
        let job = ExportJob {
            source: &source,
            exchange: &exchange,
            output: &output,
            selection: None,
            labels: None,
        };
        let config = ExchangeConfig::default().with_validation(ValidationPolicy::Enforce);
        let report = run_export(&tools, &config, &job)
            .unwrap_or_else(|err| panic!("export failed: {err}"));
        assert_eq!(report.rows_in("wastewater_node"), 1);
        assert!(output.is_file());
        assert_eq!(
            *tools.calls.borrow(),
            vec!["create_schema", "encode", "validate"]
        );
    }

    #[rstest]
    #[case(ValidationPolicy::Warn, true)]
    #[case(ValidationPolicy::Enforce, false)]
    fn validation_policy_decides_failures(
        workspace: Workspace,
        #[case] policy: ValidationPolicy,
        #[case] succeeds: bool,
    ) {
        let tools = RecordingTools {
            reject: true,
            ..RecordingTools::default()
        };
        let (source, exchange, output) = export_job(&workspace);
        let job = ExportJob {
            source: &source,
            exchange: &exchange,
            output: &output,
            selection: None,
            labels: None,
        };
        let config = ExchangeConfig::default().with_validation(policy);
        let result = run_export(&tools, &config, &job);
        assert_eq!(result.is_ok(), succeeds);
    }

    #[rstest]
    fn import_validates_before_decoding(workspace: Workspace) {
        let tools = RecordingTools {
            reject: true,
            ..RecordingTools::default()
        };
        let input = workspace.path("transfer.xtf");
        std::fs::write(&input, "<TRANSFER/>").unwrap_or_else(|err| panic!("write: {err}"));
        let exchange = workspace.path("exchange.gpkg");
        let target = workspace.path("network.sqlite");
        let job = ImportJob {
            input: &input,
            exchange: &exchange,
            target: &target,
        };
        let config = ExchangeConfig::default().with_validation(ValidationPolicy::Enforce);
        let result = run_import(&tools, &config, &job);
        assert!(matches!(
            result,
            Err(PipelineError::Tool(ToolError::Validation { .. }))
        ));
        assert_eq!(*tools.calls.borrow(), vec!["validate"]);
    }

    #[rstest]
    fn missing_inputs_are_reported(workspace: Workspace) {
        let tools = RecordingTools::default();
        let input = workspace.path("absent.xtf");
        let exchange = workspace.path("exchange.gpkg");
        let target = workspace.path("network.sqlite");
        let job = ImportJob {
            input: &input,
            exchange: &exchange,
            target: &target,
        };
        let result = run_import(&tools, &ExchangeConfig::default(), &job);
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
        assert!(tools.calls.borrow().is_empty());
    }
}
