//! Options shared by the export and import subcommands.

use netxfer_core::{ClosureStrategy, ExchangeConfig, ModelVariant, ValidationPolicy};
use netxfer_data::{CommandTools, ToolCommand};

use crate::{
    ARG_CLOSURE, ARG_MODEL, ARG_TRANSFER_TOOL, ARG_VALIDATION, ARG_VALIDATOR, CliError,
};

/// Raw run options as merged from flags, environment and files.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ExchangeOptions {
    pub(crate) dataset: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) closure: Option<String>,
    pub(crate) validation: Option<String>,
    pub(crate) label_orientation: Option<f64>,
}

impl ExchangeOptions {
    /// Build the engine configuration, falling back to its defaults.
    pub(crate) fn into_config(self) -> Result<ExchangeConfig, CliError> {
        let mut config = ExchangeConfig::default();
        if let Some(dataset) = self.dataset {
            config = config.with_dataset(dataset);
        }
        if let Some(model) = self.model {
            config = config.with_model(parse::<ModelVariant>(&model, ARG_MODEL)?);
        }
        if let Some(closure) = self.closure {
            config = config.with_closure_strategy(parse::<ClosureStrategy>(&closure, ARG_CLOSURE)?);
        }
        if let Some(validation) = self.validation {
            config = config.with_validation(parse::<ValidationPolicy>(&validation, ARG_VALIDATION)?);
        }
        if let Some(degrees) = self.label_orientation {
            config = config.with_label_orientation_offset(degrees);
        }
        Ok(config)
    }
}

fn parse<T>(raw: &str, field: &'static str) -> Result<T, CliError>
where
    T: std::str::FromStr<Err = netxfer_core::UnknownDiscriminator>,
{
    raw.parse()
        .map_err(|source| CliError::InvalidOption { field, source })
}

/// External tools, overriding the defaults with whitespace-separated command
/// lines.
pub(crate) fn command_tools(
    transfer: Option<&str>,
    validator: Option<&str>,
) -> Result<CommandTools, CliError> {
    let mut tools = CommandTools::default();
    if let Some(line) = transfer {
        tools.transfer = tool_command(line, ARG_TRANSFER_TOOL)?;
    }
    if let Some(line) = validator {
        tools.validator = tool_command(line, ARG_VALIDATOR)?;
    }
    Ok(tools)
}

fn tool_command(line: &str, field: &'static str) -> Result<ToolCommand, CliError> {
    let mut words = line.split_whitespace();
    let program = words
        .next()
        .ok_or(CliError::EmptyToolCommand { field })?;
    Ok(words.fold(ToolCommand::new(program), ToolCommand::arg))
}
