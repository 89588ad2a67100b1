use indexmap::IndexMap;

use crate::model::RowObject;

/// Rows edited inline and waiting for a bulk save, keyed by primary key text.
///
/// Re-queuing a key replaces its row but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangedRows {
    rows: IndexMap<String, RowObject>,
}

impl ChangedRows {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `row` under `key`, replacing an earlier change to the same row.
    pub fn insert(&mut self, key: impl Into<String>, row: RowObject) {
        self.rows.insert(key.into(), row);
    }

    /// Takes a row off the queue.
    pub fn remove(&mut self, key: &str) -> Option<RowObject> {
        self.rows.shift_remove(key)
    }

    /// The queued change for `key`.
    pub fn get(&self, key: &str) -> Option<&RowObject> {
        self.rows.get(key)
    }

    /// Whether `key` has a queued change.
    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Number of queued rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drops every queued change.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Queued rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RowObject)> {
        self.rows.iter()
    }
}
