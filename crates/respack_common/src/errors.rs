//! Deduplicating accumulator for user-visible build errors.

use std::collections::BTreeSet;

/// The set of errors collected during a run.
///
/// Errors are plain user-facing messages. Identical messages are coalesced and
/// iteration order is stable (lexicographic), so two runs over the same input
/// report the same set in the same order. Every insertion is also logged at
/// error level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSet {
    errors: BTreeSet<String>,
}

impl ErrorSet {
    /// Creates an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error message, logging it.
    ///
    /// Returns `true` if the message was not already present.
    pub fn add(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        tracing::error!("{message}");
        self.errors.insert(message)
    }

    /// Merges every message from `other` into this set.
    pub fn extend(&mut self, other: ErrorSet) {
        self.errors.extend(other.errors);
    }

    /// Returns `true` if no errors have been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of distinct errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if the exact message has been recorded.
    pub fn contains(&self, message: &str) -> bool {
        self.errors.contains(message)
    }

    /// Iterates over the recorded messages in stable order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(String::as_str)
    }
}

impl IntoIterator for ErrorSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
