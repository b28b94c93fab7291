//! Recoverable data-quality findings raised while mapping rows.
//!
//! None of these conditions abort a run. Each finding is logged when it is
//! recorded and retained so callers can report or assert on it afterwards.

use std::fmt;

use log::warn;

/// Location of a mapped attribute: the row's natural key and the field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSite<'a> {
    /// Natural key of the row being mapped.
    pub key: &'a str,
    /// Name of the attribute being mapped.
    pub field: &'static str,
}

impl<'a> FieldSite<'a> {
    /// Create a site for `field` on the row identified by `key`.
    pub const fn new(key: &'a str, field: &'static str) -> Self {
        Self { key, field }
    }
}

/// A recoverable condition encountered during mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingWarning {
    /// A value mandatory in the target schema was absent and replaced by `""`.
    MissingMandatoryValue {
        /// Natural key of the affected row.
        key: String,
        /// Affected field.
        field: &'static str,
    },
    /// An empty string was replaced by an absent value.
    EmptyStringCoerced {
        /// Natural key of the affected row.
        key: String,
        /// Affected field.
        field: &'static str,
    },
    /// A text value exceeded the target length and was cut.
    ValueTruncated {
        /// Natural key of the affected row.
        key: String,
        /// Affected field.
        field: &'static str,
        /// Value before truncation.
        original: String,
        /// Maximum number of characters allowed.
        limit: usize,
    },
    /// A coded value had no entry in its value list.
    ValueListMiss {
        /// Natural key of the affected row.
        key: String,
        /// Affected field.
        field: &'static str,
        /// Name of the value list consulted.
        list: &'static str,
        /// Value that could not be resolved.
        value: String,
    },
    /// A reference pointed outside the exported or imported data.
    DanglingReference {
        /// Natural key of the affected row.
        key: String,
        /// Affected field.
        field: &'static str,
        /// Reference that could not be resolved.
        reference: String,
    },
}

impl MappingWarning {
    /// Natural key of the row the warning refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::MissingMandatoryValue { key, .. }
            | Self::EmptyStringCoerced { key, .. }
            | Self::ValueTruncated { key, .. }
            | Self::ValueListMiss { key, .. }
            | Self::DanglingReference { key, .. } => key,
        }
    }

    /// Field the warning refers to.
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingMandatoryValue { field, .. }
            | Self::EmptyStringCoerced { field, .. }
            | Self::ValueTruncated { field, .. }
            | Self::ValueListMiss { field, .. }
            | Self::DanglingReference { field, .. } => field,
        }
    }
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMandatoryValue { key, field } => {
                write!(f, "{key}: mandatory field {field} is missing, using empty string")
            }
            Self::EmptyStringCoerced { key, field } => {
                write!(f, "{key}: empty string in {field} replaced by NULL")
            }
            Self::ValueTruncated {
                key,
                field,
                original,
                limit,
            } => write!(
                f,
                "{key}: {field} truncated to {limit} characters (was {original:?})"
            ),
            Self::ValueListMiss {
                key,
                field,
                list,
                value,
            } => write!(f, "{key}: {field} value {value:?} not found in value list {list}"),
            Self::DanglingReference {
                key,
                field,
                reference,
            } => write!(
                f,
                "{key}: {field} references {reference}, which is not part of the transfer"
            ),
        }
    }
}

/// Run-scoped collector for [`MappingWarning`]s.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<MappingWarning>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Log and retain a warning.
    pub fn record(&mut self, warning: MappingWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Warnings recorded so far, in order.
    pub fn warnings(&self) -> &[MappingWarning] {
        &self.warnings
    }

    /// Number of recorded warnings.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Whether no warning was recorded.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Consume the collector, returning its warnings.
    pub fn into_warnings(self) -> Vec<MappingWarning> {
        self.warnings
    }
}
