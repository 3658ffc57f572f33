//! Retention policy for finished jobs.

use std::time::Duration;

/// How long, and how many, finished jobs the result store keeps.
///
/// Non-terminal jobs are never evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Terminal records older than this (by `finished_at`) are dropped.
    pub max_age: Duration,

    /// Upper bound on stored records; oldest finished records go first.
    pub max_entries: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            max_entries: None,
        }
    }
}
