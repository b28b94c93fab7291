//! Ordered key sets describing what a partial export covers.

use std::collections::HashSet;

/// Ordered set of natural keys.
///
/// Keys keep their first insertion order; inserting a key twice is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    order: Vec<String>,
    members: HashSet<String>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, returning `true` if it was not present yet.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.members.contains(&key) {
            return false;
        }
        self.members.insert(key.clone());
        self.order.push(key);
        true
    }

    /// Whether `key` is a member.
    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the selection is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = Self::new();
        selection.extend(iter);
        selection
    }
}

impl<S: Into<String>> Extend<S> for Selection {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

/// Referentially closed result of the selection closure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptedSelection {
    /// Network elements (nodes and reaches) to export.
    pub elements: Selection,
    /// Structures owning the exported elements.
    pub structures: Selection,
    /// Set when no selection was supplied and the whole dataset is exported.
    pub whole_dataset: bool,
    /// Reaches left out because only closure expansion connected them.
    pub extra_reaches: usize,
    /// Selected keys absent from the source network. They stay in
    /// `elements` but never count as exported.
    pub unknown: Selection,
}

impl AdaptedSelection {
    /// Whether an element is part of the export.
    pub fn contains_element(&self, key: &str) -> bool {
        self.elements.contains(key) && !self.unknown.contains(key)
    }

    /// Whether a structure is part of the export.
    pub fn contains_structure(&self, key: &str) -> bool {
        self.structures.contains(key)
    }
}
