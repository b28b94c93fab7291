//! External schema, transfer-file and validation tools.
//!
//! The engine never parses transfer files itself. [`ExchangeTools`] is the
//! seam to the command-line tools that create the exchange schema, encode it
//! into a transfer file, decode a transfer file back into it and validate a
//! file against its model. [`CommandTools`] drives them as child processes.

use std::process::{Command, Output};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::remove_file_if_exists;

/// Errors raised by external tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool could not be started.
    #[error("failed to start {tool}")]
    Spawn {
        /// Program name.
        tool: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The tool exited unsuccessfully.
    #[error("{tool} failed with status {}: {stderr}", .status.map_or_else(|| "signal".to_owned(), |code| code.to_string()))]
    Failed {
        /// Program name.
        tool: String,
        /// Exit code, absent when killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// The validator rejected a transfer file.
    #[error("transfer file {path} failed validation: {report}")]
    Validation {
        /// Validated file.
        path: Utf8PathBuf,
        /// Validator output.
        report: String,
    },
    /// A stale exchange database could not be removed.
    #[error("failed to remove {path}")]
    Remove {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Operations delegated to external tooling.
pub trait ExchangeTools {
    /// Create the exchange schema for `models` in `database`.
    ///
    /// # Errors
    /// Tool failures.
    fn create_schema(
        &self,
        database: &Utf8Path,
        models: &[&str],
        recreate: bool,
    ) -> Result<(), ToolError>;

    /// Encode the exchange database into the transfer file `output`.
    ///
    /// # Errors
    /// Tool failures.
    fn encode(&self, database: &Utf8Path, models: &[&str], output: &Utf8Path)
    -> Result<(), ToolError>;

    /// Decode the transfer file `input` into the exchange database.
    ///
    /// # Errors
    /// Tool failures.
    fn decode(&self, database: &Utf8Path, input: &Utf8Path) -> Result<(), ToolError>;

    /// Validate the transfer file at `path`.
    ///
    /// # Errors
    /// [`ToolError::Validation`] when the file is rejected.
    fn validate(&self, path: &Utf8Path) -> Result<(), ToolError>;
}

/// A program and the arguments preceding the operation's own arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Program to run.
    pub program: String,
    /// Leading arguments, such as `-jar ili2gpkg.jar`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Command running `program` without leading arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a leading argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn output<I, S>(&self, args: I) -> Result<Output, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(args);
        debug!("running {command:?}");
        command.output().map_err(|source| ToolError::Spawn {
            tool: self.program.clone(),
            source,
        })
    }

    fn run<I, S>(&self, args: I) -> Result<(), ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(());
        }
        Err(ToolError::Failed {
            tool: self.program.clone(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

/// [`ExchangeTools`] backed by an ili2db-style transfer tool and a
/// standalone validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTools {
    /// Schema and transfer-file tool.
    pub transfer: ToolCommand,
    /// Transfer-file validator.
    pub validator: ToolCommand,
}

impl Default for CommandTools {
    fn default() -> Self {
        Self {
            transfer: ToolCommand::new("java").arg("-jar").arg("ili2gpkg.jar"),
            validator: ToolCommand::new("java").arg("-jar").arg("ilivalidator.jar"),
        }
    }
}

impl ExchangeTools for CommandTools {
    fn create_schema(
        &self,
        database: &Utf8Path,
        models: &[&str],
        recreate: bool,
    ) -> Result<(), ToolError> {
        if recreate
            && remove_file_if_exists(database).map_err(|source| ToolError::Remove {
                path: database.to_path_buf(),
                source,
            })?
        {
            info!("removed stale exchange database {database}");
        }
        let models = models.join(";");
        self.transfer.run([
            "--schemaimport",
            "--createBasketCol",
            "--createTidCol",
            "--dbfile",
            database.as_str(),
            "--models",
            models.as_str(),
        ])
    }

    fn encode(
        &self,
        database: &Utf8Path,
        models: &[&str],
        output: &Utf8Path,
    ) -> Result<(), ToolError> {
        let models = models.join(";");
        self.transfer.run([
            "--export",
            "--dbfile",
            database.as_str(),
            "--models",
            models.as_str(),
            output.as_str(),
        ])
    }

    fn decode(&self, database: &Utf8Path, input: &Utf8Path) -> Result<(), ToolError> {
        self.transfer.run([
            "--import",
            "--deleteData",
            "--dbfile",
            database.as_str(),
            input.as_str(),
        ])
    }

    fn validate(&self, path: &Utf8Path) -> Result<(), ToolError> {
        let output = self.validator.output([path.as_str()])?;
        if output.status.success() {
            info!("{path} passed validation");
            return Ok(());
        }
        let mut report = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str(stderr.trim());
        }
        Err(ToolError::Validation {
            path: path.to_path_buf(),
            report,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rstest::rstest;

    fn shell(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script).arg("tool")
    }

    fn tools(transfer: &str, validator: &str) -> CommandTools {
        CommandTools {
            transfer: shell(transfer),
            validator: shell(validator),
        }
    }

    #[rstest]
    fn passes_operation_arguments() {
        let tools = tools(r#"[ "$1" = "--export" ] && [ "$5" = "A;B" ]"#, "exit 0");
        let result = tools.encode(
            Utf8Path::new("exchange.gpkg"),
            &["A", "B"],
            Utf8Path::new("out.xtf"),
        );
        assert!(result.is_ok(), "unexpected failure: {result:?}");
    }

    #[rstest]
    fn reports_failed_commands() {
        let tools = tools("echo broken >&2; exit 3", "exit 0");
        let result = tools.decode(Utf8Path::new("exchange.gpkg"), Utf8Path::new("in.xtf"));
        match result {
            Err(ToolError::Failed { status, stderr, .. }) => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected a failed command, got {other:?}"),
        }
    }

    #[rstest]
    fn validation_failures_carry_the_report() {
        let tools = tools("exit 0", "echo 'Error: line 4: missing identifier'; exit 1");
        let result = tools.validate(Utf8Path::new("out.xtf"));
        match result {
            Err(ToolError::Validation { report, .. }) => {
                assert_eq!(report, "Error: line 4: missing identifier");
            }
            other => panic!("expected a validation failure, got {other:?}"),
        }
    }

    #[rstest]
    fn missing_programs_fail_to_spawn() {
        let tools = CommandTools {
            transfer: ToolCommand::new("/nonexistent/netxfer-transfer-tool"),
            validator: ToolCommand::new("/nonexistent/netxfer-validator"),
        };
        assert!(matches!(
            tools.validate(Utf8Path::new("out.xtf")),
            Err(ToolError::Spawn { .. })
        ));
    }
}
