use std::collections::VecDeque;

use ahash::AHashMap;
use strata_core::{StrataError, ViewId, report_once};

/// Detached cells waiting to be dequeued, per reuse identifier. First in,
/// first out, so reloading unchanged data hands every row its old cell.
///
/// Never evicts.
#[derive(Debug, Default)]
pub struct ReusePool {
    queues: AHashMap<String, VecDeque<ViewId>>,
}

impl ReusePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and reports once) if the cell is already pooled.
    pub fn push(&mut self, identifier: &str, cell: ViewId) -> bool {
        let queue = self.queues.entry(identifier.to_owned()).or_default();
        if queue.contains(&cell) {
            report_once(&StrataError::AlreadyDetached(format!("cell {cell:?}")));
            return false;
        }
        queue.push_back(cell);
        true
    }

    pub fn pop(&mut self, identifier: &str) -> Option<ViewId> {
        self.queues.get_mut(identifier)?.pop_front()
    }

    pub fn contains(&self, cell: ViewId) -> bool {
        self.queues.values().any(|q| q.contains(&cell))
    }

    pub fn count(&self, identifier: &str) -> usize {
        self.queues.get(identifier).map_or(0, VecDeque::len)
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the pool, returning every cell.
    pub fn drain(&mut self) -> Vec<ViewId> {
        self.queues.drain().flat_map(|(_, q)| q).collect()
    }
}
