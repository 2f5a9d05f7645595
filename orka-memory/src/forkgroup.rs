//! ForkGroup coordination record (§3, §4.4.3): the set of branch ids a
//! Fork expects, and the subset that have reported completion. Stored in
//! the memory store under `forkgroup:<group_id>` so Join can observe it
//! across concurrent branch tasks without holding a lock across awaits.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub fn store_key(group_id: &str) -> String {
    format!("forkgroup:{group_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkGroup {
    pub group_id: String,
    pub expected: BTreeSet<String>,
    pub completed: BTreeSet<String>,
}

impl ForkGroup {
    pub fn new(group_id: impl Into<String>, expected: impl IntoIterator<Item = String>) -> Self {
        Self {
            group_id: group_id.into(),
            expected: expected.into_iter().collect(),
            completed: BTreeSet::new(),
        }
    }

    pub fn mark_completed(&mut self, branch_id: impl Into<String>) {
        self.completed.insert(branch_id.into());
    }

    /// `all` mode: every expected branch has reported.
    pub fn is_complete_all(&self) -> bool {
        self.expected.is_subset(&self.completed)
    }

    /// `any` mode: at least one expected branch has reported. An empty
    /// expected set is vacuously complete per §8's Join boundary case.
    pub fn is_complete_any(&self) -> bool {
        self.expected.is_empty() || !self.completed.is_disjoint(&self.expected)
    }

    pub fn is_ready(&self, mode: JoinMode) -> bool {
        match mode {
            JoinMode::All => self.is_complete_all(),
            JoinMode::Any => self.is_complete_any(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    All,
    Any,
}
