//! Import command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use netxfer_core::ExchangeConfig;
use netxfer_data::{CommandTools, ExchangeTools, ImportJob};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::options::{ExchangeOptions, command_tools};
use crate::summary::{ImportSummary, write_summary};
use crate::{
    ARG_EXCHANGE, ARG_INPUT, ARG_MODEL, ARG_TARGET, ARG_TRANSFER_TOOL, ARG_VALIDATION,
    ARG_VALIDATOR, CliError, ENV_IMPORT_INPUT, ENV_IMPORT_TARGET, require_existing,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Validate a transfer file, decode it into the exchange \
                 schema and create or update the matching application \
                 objects. Importing the same file twice leaves the object \
                 counts unchanged. Any failure rolls the import back.",
    about = "Import a transfer file into the application database"
)]
#[ortho_config(prefix = "NETXFER")]
pub(crate) struct ImportArgs {
    /// Transfer file to read.
    #[arg(long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Application database receiving the data.
    #[arg(long = ARG_TARGET, value_name = "path")]
    #[serde(default)]
    pub(crate) target: Option<Utf8PathBuf>,
    /// Working exchange database; defaults to the input path with a `.gpkg` extension.
    #[arg(long = ARG_EXCHANGE, value_name = "path")]
    #[serde(default)]
    pub(crate) exchange: Option<Utf8PathBuf>,
    /// Exchange model (`wastewater` or `wastewater-inspection`).
    #[arg(long = ARG_MODEL, value_name = "name")]
    #[serde(default)]
    pub(crate) model: Option<String>,
    /// Validator failure handling (`enforce`, `warn` or `skip`).
    #[arg(long = ARG_VALIDATION, value_name = "policy")]
    #[serde(default)]
    pub(crate) validation: Option<String>,
    /// Command line of the transfer tool.
    #[arg(long = ARG_TRANSFER_TOOL, value_name = "command")]
    #[serde(default)]
    pub(crate) transfer_tool: Option<String>,
    /// Command line of the validator.
    #[arg(long = ARG_VALIDATOR, value_name = "command")]
    #[serde(default)]
    pub(crate) validator: Option<String>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct ImportConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) target: Utf8PathBuf,
    pub(crate) exchange: Utf8PathBuf,
    pub(crate) run: ExchangeConfig,
    pub(crate) tools: CommandTools,
}

impl ImportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.input, ARG_INPUT)?;
        require_existing(&self.target, ARG_TARGET)
    }

    fn job(&self) -> ImportJob<'_> {
        ImportJob {
            input: &self.input,
            exchange: &self.exchange,
            target: &self.target,
        }
    }
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_IMPORT_INPUT,
        })?;
        let target = args.target.ok_or(CliError::MissingArgument {
            field: ARG_TARGET,
            env: ENV_IMPORT_TARGET,
        })?;
        let exchange = args
            .exchange
            .unwrap_or_else(|| input.with_extension("gpkg"));
        let tools = command_tools(args.transfer_tool.as_deref(), args.validator.as_deref())?;
        let run = ExchangeOptions {
            model: args.model,
            validation: args.validation,
            ..ExchangeOptions::default()
        }
        .into_config()?;
        Ok(Self {
            input,
            target,
            exchange,
            run,
            tools,
        })
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), CliError> {
    let config = resolve_import_config(args)?;
    let mut stdout = std::io::stdout().lock();
    run_import_with(&config, &config.tools, &mut stdout)
}

pub(crate) fn resolve_import_config(args: ImportArgs) -> Result<ImportConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Run the import with `tools` and write the JSON summary to `writer`.
pub(crate) fn run_import_with(
    config: &ImportConfig,
    tools: &impl ExchangeTools,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let report = netxfer_data::run_import(tools, &config.run, &config.job())?;
    write_summary(writer, &ImportSummary::new(&config.input, &report))
}
