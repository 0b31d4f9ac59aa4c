use std::collections::HashMap;

use crate::types::EpochSnapshot;

/// Latest epoch snapshot per credential token.
///
/// Lives only in memory: a restart means the first poll for every account has
/// no baseline. Entries are replaced wholesale, never merged.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    by_token: HashMap<String, EpochSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot from the last completed poll, or `None` before the first one.
    pub fn get(&self, token: &str) -> Option<&EpochSnapshot> {
        self.by_token.get(token)
    }

    /// Store `snapshot` for `token`, returning whatever it replaced.
    pub fn replace(&mut self, token: &str, snapshot: EpochSnapshot) -> Option<EpochSnapshot> {
        self.by_token.insert(token.to_string(), snapshot)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}
