//! JSON run summaries printed on stdout.

use std::collections::BTreeMap;
use std::io::Write;

use camino::Utf8Path;
use netxfer_data::{ExportReport, ImportReport};
use serde::Serialize;

use crate::CliError;

#[derive(Debug, Serialize)]
pub(crate) struct BasketSummary {
    pub(crate) tid: i64,
    pub(crate) topic: String,
}

/// Outcome of an export run.
#[derive(Debug, Serialize)]
pub(crate) struct ExportSummary {
    pub(crate) output: String,
    pub(crate) rows: BTreeMap<&'static str, usize>,
    pub(crate) baskets: Vec<BasketSummary>,
    pub(crate) extra_reaches: usize,
    pub(crate) warnings: Vec<String>,
}

impl ExportSummary {
    pub(crate) fn new(output: &Utf8Path, report: &ExportReport) -> Self {
        Self {
            output: output.to_string(),
            rows: report.rows.clone(),
            baskets: report
                .baskets
                .iter()
                .map(|basket| BasketSummary {
                    tid: basket.tid.get(),
                    topic: basket.topic.to_string(),
                })
                .collect(),
            extra_reaches: report.extra_reaches,
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Outcome of an import run.
#[derive(Debug, Serialize)]
pub(crate) struct ImportSummary {
    pub(crate) input: String,
    pub(crate) created: usize,
    pub(crate) updated: usize,
    pub(crate) rows: BTreeMap<&'static str, usize>,
    pub(crate) warnings: Vec<String>,
}

impl ImportSummary {
    pub(crate) fn new(input: &Utf8Path, report: &ImportReport) -> Self {
        Self {
            input: input.to_string(),
            created: report.created,
            updated: report.updated,
            rows: report.rows.clone(),
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

pub(crate) fn write_summary(writer: &mut dyn Write, summary: &impl Serialize) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerializeSummary)?;
    writer
        .write_all(payload.as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .map_err(CliError::WriteSummary)
}
