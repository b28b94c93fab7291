//! Export command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use netxfer_core::{ExchangeConfig, Selection};
use netxfer_data::{CommandTools, ExchangeTools, ExportJob};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::options::{ExchangeOptions, command_tools};
use crate::summary::{ExportSummary, write_summary};
use crate::{
    ARG_CLOSURE, ARG_DATASET, ARG_EXCHANGE, ARG_LABEL_ORIENTATION, ARG_LABELS, ARG_MODEL,
    ARG_OUTPUT, ARG_SELECT, ARG_SOURCE, ARG_TRANSFER_TOOL, ARG_VALIDATION, ARG_VALIDATOR,
    CliError, ENV_EXPORT_OUTPUT, ENV_EXPORT_SOURCE, require_existing,
};

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Map the application database into the exchange schema, \
                 encode a transfer file and validate it. Without --select \
                 the whole dataset is exported; with it, only the listed \
                 network elements and the objects they depend on.",
    about = "Export network data into a transfer file"
)]
#[ortho_config(prefix = "NETXFER")]
pub(crate) struct ExportArgs {
    /// Application database to export.
    #[arg(long = ARG_SOURCE, value_name = "path")]
    #[serde(default)]
    pub(crate) source: Option<Utf8PathBuf>,
    /// Transfer file to write.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Working exchange database; defaults to the output path with a `.gpkg` extension.
    #[arg(long = ARG_EXCHANGE, value_name = "path")]
    #[serde(default)]
    pub(crate) exchange: Option<Utf8PathBuf>,
    /// Comma-separated network element keys to export.
    #[arg(long = ARG_SELECT, value_name = "keys")]
    #[serde(default)]
    pub(crate) select: Option<String>,
    /// JSON label file produced by the map renderer.
    #[arg(long = ARG_LABELS, value_name = "path")]
    #[serde(default)]
    pub(crate) labels: Option<Utf8PathBuf>,
    /// Dataset name written to the exchange schema.
    #[arg(long = ARG_DATASET, value_name = "name")]
    #[serde(default)]
    pub(crate) dataset: Option<String>,
    /// Exchange model (`wastewater` or `wastewater-inspection`).
    #[arg(long = ARG_MODEL, value_name = "name")]
    #[serde(default)]
    pub(crate) model: Option<String>,
    /// Selection closure (`single-pass` or `fixpoint`).
    #[arg(long = ARG_CLOSURE, value_name = "strategy")]
    #[serde(default)]
    pub(crate) closure: Option<String>,
    /// Validator failure handling (`enforce`, `warn` or `skip`).
    #[arg(long = ARG_VALIDATION, value_name = "policy")]
    #[serde(default)]
    pub(crate) validation: Option<String>,
    /// Degrees added to label rotations.
    #[arg(long = ARG_LABEL_ORIENTATION, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) label_orientation: Option<f64>,
    /// Command line of the transfer tool.
    #[arg(long = ARG_TRANSFER_TOOL, value_name = "command")]
    #[serde(default)]
    pub(crate) transfer_tool: Option<String>,
    /// Command line of the validator.
    #[arg(long = ARG_VALIDATOR, value_name = "command")]
    #[serde(default)]
    pub(crate) validator: Option<String>,
}

impl ExportArgs {
    pub(crate) fn into_config(self) -> Result<ExportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExportConfig::try_from(merged)
    }
}

/// Resolved `export` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct ExportConfig {
    pub(crate) source: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) exchange: Utf8PathBuf,
    pub(crate) selection: Option<Selection>,
    pub(crate) labels: Option<Utf8PathBuf>,
    pub(crate) run: ExchangeConfig,
    pub(crate) tools: CommandTools,
}

impl ExportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.source, ARG_SOURCE)?;
        if let Some(labels) = &self.labels {
            require_existing(labels, ARG_LABELS)?;
        }
        Ok(())
    }

    fn job(&self) -> ExportJob<'_> {
        ExportJob {
            source: &self.source,
            exchange: &self.exchange,
            output: &self.output,
            selection: self.selection.as_ref(),
            labels: self.labels.as_deref(),
        }
    }
}

impl TryFrom<ExportArgs> for ExportConfig {
    type Error = CliError;

    fn try_from(args: ExportArgs) -> Result<Self, Self::Error> {
        let source = args.source.ok_or(CliError::MissingArgument {
            field: ARG_SOURCE,
            env: ENV_EXPORT_SOURCE,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_EXPORT_OUTPUT,
        })?;
        let exchange = args
            .exchange
            .unwrap_or_else(|| output.with_extension("gpkg"));
        let selection = args.select.as_deref().map(parse_selection);
        let tools = command_tools(args.transfer_tool.as_deref(), args.validator.as_deref())?;
        let run = ExchangeOptions {
            dataset: args.dataset,
            model: args.model,
            closure: args.closure,
            validation: args.validation,
            label_orientation: args.label_orientation,
        }
        .into_config()?;
        Ok(Self {
            source,
            output,
            exchange,
            selection,
            labels: args.labels,
            run,
            tools,
        })
    }
}

fn parse_selection(raw: &str) -> Selection {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .collect()
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), CliError> {
    let config = resolve_export_config(args)?;
    let mut stdout = std::io::stdout().lock();
    run_export_with(&config, &config.tools, &mut stdout)
}

pub(crate) fn resolve_export_config(args: ExportArgs) -> Result<ExportConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Run the export with `tools` and write the JSON summary to `writer`.
pub(crate) fn run_export_with(
    config: &ExportConfig,
    tools: &impl ExchangeTools,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let report = netxfer_data::run_export(tools, &config.run, &config.job())?;
    write_summary(writer, &ExportSummary::new(&config.output, &report))
}
