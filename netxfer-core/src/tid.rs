//! Run-scoped transient identifiers for rows crossing the schema boundary.
//!
//! The exchange schema addresses rows by an integer `t_id` that is unrelated
//! to the application's natural keys. [`TidTranslator`] hands out those
//! identifiers for one run: the same natural key always maps to the same
//! [`Tid`], and distinct keys never share one. Nothing is persisted, so TIDs
//! differ between runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// A transient identifier (`t_id` column of the exchange schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(i64);

impl Tid {
    /// Wrap a raw `t_id` value.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw `t_id` value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memoizing allocator of [`Tid`]s for one run.
///
/// # Examples
/// ```
/// use netxfer_core::tid::TidTranslator;
///
/// let mut translator = TidTranslator::default();
/// let first = translator.tid_for(Some("ch000001"));
/// assert_eq!(translator.tid_for(Some("ch000001")), first);
/// assert_ne!(translator.tid_for(Some("ch000002")), first);
/// assert_eq!(translator.tid_for(None), None);
/// ```
#[derive(Debug)]
pub struct TidTranslator {
    next: i64,
    by_key: HashMap<String, Tid>,
    emitted: HashSet<Tid>,
    referenced: BTreeMap<Tid, String>,
}

impl Default for TidTranslator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TidTranslator {
    /// Create a translator whose first allocation is `first`.
    ///
    /// Use an offset above the largest `t_id` already stored in the exchange
    /// schema when appending to an existing database.
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: first,
            by_key: HashMap::new(),
            emitted: HashSet::new(),
            referenced: BTreeMap::new(),
        }
    }

    /// Translate an optional natural key.
    ///
    /// An absent key yields an absent TID, which keeps foreign-key mapping
    /// total.
    pub fn tid_for(&mut self, key: Option<&str>) -> Option<Tid> {
        key.map(|natural_key| self.row_tid(natural_key))
    }

    /// Translate a natural key, allocating on first use.
    pub fn row_tid(&mut self, key: &str) -> Tid {
        if let Some(tid) = self.by_key.get(key) {
            return *tid;
        }
        let tid = self.allocate();
        self.by_key.insert(key.to_owned(), tid);
        tid
    }

    /// Allocate a TID that has no source row.
    pub fn next_tid(&mut self) -> Tid {
        self.allocate()
    }

    /// Translate a key used as a foreign key and remember that it must exist.
    pub fn reference(&mut self, key: &str) -> Tid {
        let tid = self.row_tid(key);
        self.referenced
            .entry(tid)
            .or_insert_with(|| key.to_owned());
        tid
    }

    /// Record that a row carrying `tid` was written.
    pub fn mark_emitted(&mut self, tid: Tid) {
        self.emitted.insert(tid);
    }

    /// Referenced keys for which no row was emitted, in allocation order.
    pub fn unresolved_references(&self) -> Vec<&str> {
        self.referenced
            .iter()
            .filter(|(tid, _)| !self.emitted.contains(tid))
            .map(|(_, key)| key.as_str())
            .collect()
    }

    /// Number of natural keys translated so far.
    pub fn translated_keys(&self) -> usize {
        self.by_key.len()
    }

    fn allocate(&mut self) -> Tid {
        let tid = Tid(self.next);
        self.next += 1;
        tid
    }
}
