//! Label files produced by GIS tooling.
//!
//! A label file is a JSON array of objects with `obj_id`, `text`, `position`
//! and `rotation` members; every member but `obj_id` may be omitted.

use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use netxfer_core::Label;
use thiserror::Error;

use crate::fs::open_utf8_file;

/// Errors raised while reading a label file.
#[derive(Debug, Error)]
pub enum LabelsError {
    /// The file could not be opened.
    #[error("failed to open label file {path}")]
    Open {
        /// Path of the label file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a JSON array of labels.
    #[error("failed to parse label file {path}")]
    Parse {
        /// Path of the label file.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Read every label of the file at `path`.
///
/// # Errors
/// [`LabelsError::Open`] when the file cannot be opened and
/// [`LabelsError::Parse`] when it is not a label array.
pub fn read_labels(path: &Utf8Path) -> Result<Vec<Label>, LabelsError> {
    let file = open_utf8_file(path).map_err(|source| LabelsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let labels: Vec<Label> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            LabelsError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
    debug!("read {} labels from {path}", labels.len());
    Ok(labels)
}
