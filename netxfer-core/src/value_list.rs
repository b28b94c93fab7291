//! Coded domain values and their wire representation.

use std::collections::HashMap;

/// One member of a code list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueListEntry {
    /// Name of the code list.
    pub list: String,
    /// Code stored in the application schema.
    pub code: i64,
    /// Display string written to the exchange schema.
    pub display: String,
}

impl ValueListEntry {
    /// Create an entry.
    pub fn new(list: impl Into<String>, code: i64, display: impl Into<String>) -> Self {
        Self {
            list: list.into(),
            code,
            display: display.into(),
        }
    }
}

/// Bidirectional lookup over all loaded code lists.
///
/// Display lookups are exact and case-sensitive.
///
/// # Examples
/// ```
/// use netxfer_core::value_list::{ValueListEntry, ValueLists};
///
/// let lists: ValueLists = [ValueListEntry::new("reach_material", 5081, "concrete")]
///     .into_iter()
///     .collect();
/// assert_eq!(lists.display_for("reach_material", 5081), Some("concrete"));
/// assert_eq!(lists.code_for("reach_material", "Concrete"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValueLists {
    by_code: HashMap<(String, i64), String>,
    by_display: HashMap<(String, String), i64>,
}

impl ValueLists {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry; later entries replace earlier ones.
    pub fn insert(&mut self, entry: ValueListEntry) {
        self.by_display
            .insert((entry.list.clone(), entry.display.clone()), entry.code);
        self.by_code.insert((entry.list, entry.code), entry.display);
    }

    /// Display string of `code` in `list`.
    pub fn display_for(&self, list: &str, code: i64) -> Option<&str> {
        self.by_code
            .get(&(list.to_owned(), code))
            .map(String::as_str)
    }

    /// Code of `display` in `list`.
    pub fn code_for(&self, list: &str, display: &str) -> Option<i64> {
        self.by_display
            .get(&(list.to_owned(), display.to_owned()))
            .copied()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether no entry is registered.
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl FromIterator<ValueListEntry> for ValueLists {
    fn from_iter<I: IntoIterator<Item = ValueListEntry>>(iter: I) -> Self {
        let mut lists = Self::new();
        for entry in iter {
            lists.insert(entry);
        }
        lists
    }
}
