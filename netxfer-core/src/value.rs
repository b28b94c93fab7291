//! Column values moved between the application and exchange schemas.
//!
//! Both schemas are relational, so a row is modelled as an ordered map from
//! column name to [`Value`]. Column names come from the static mapping rule
//! table, which keeps the maps cheap to build and compare.

use std::collections::BTreeMap;
use std::fmt;

/// A single column value.
///
/// The variants mirror the SQLite storage classes. Geometry columns travel as
/// opaque `Text` or `Blob` payloads; the engine never interprets them.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value (SQL `NULL`).
    #[default]
    Null,
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary payload.
    Blob(Vec<u8>),
}

/// Row attributes keyed by column name.
pub type Attributes = BTreeMap<&'static str, Value>;

impl Value {
    /// Returns `true` when the value is SQL `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Read the value as an integer.
    ///
    /// Text holding a decimal integer is accepted because SQLite columns
    /// without a declared type keep whatever the writer stored.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read the value as a floating-point number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => i32::try_from(*value).ok().map(f64::from),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert the value into owned text.
    ///
    /// Numbers are rendered in their canonical decimal form; `NULL` and blobs
    /// yield `None`.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Integer(value) => Some(value.to_string()),
            Self::Real(value) => Some(value.to_string()),
            Self::Null | Self::Blob(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
