//! Background decay sweeper and the on-demand `cleanup_expired_memories`
//! operation (§4.3.3).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::MemoryStore;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SweepReport {
    pub expired_found: usize,
    pub cleaned: usize,
    pub errors: usize,
}

/// Scan every entry, delete those past their `expire_at_ms`. `dry_run`
/// reports what would be deleted without deleting it — used both by the
/// scheduled sweeper and by the on-demand operation.
pub async fn cleanup_expired_memories(store: &dyn MemoryStore, dry_run: bool, now_ms: i64) -> SweepReport {
    let mut report = SweepReport::default();
    for entry in store.all_entries().await {
        let Some(expire_at) = entry.expire_at_ms else {
            continue;
        };
        if expire_at >= now_ms {
            continue;
        }
        report.expired_found += 1;
        if !dry_run && store.delete_entry(&entry.id).await {
            report.cleaned += 1;
        }
    }
    report
}

/// Runs [`cleanup_expired_memories`] on an interval, doubling the wait on
/// consecutive failures (capped) and resetting to the configured base on
/// a clean sweep, per the supplemented backoff behavior.
pub struct DecaySweeper {
    store: Arc<dyn MemoryStore>,
    base_interval: Duration,
    max_interval: Duration,
    consecutive_failures: AtomicU32,
}

impl DecaySweeper {
    pub fn new(store: Arc<dyn MemoryStore>, check_interval_minutes: u64) -> Self {
        Self {
            store,
            base_interval: Duration::from_secs(check_interval_minutes.max(1) * 60),
            max_interval: Duration::from_secs(check_interval_minutes.max(1) * 60 * 8),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    fn current_interval(&self) -> Duration {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        let multiplier = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        let scaled = self.base_interval.saturating_mul(multiplier);
        scaled.min(self.max_interval)
    }

    /// One sweep cycle: used directly by tests (with `tokio::time::pause`
    /// driving the sleep) and by [`Self::run_forever`]'s loop body.
    pub async fn sweep_once(&self, now_ms: i64) -> SweepReport {
        let report = cleanup_expired_memories(self.store.as_ref(), false, now_ms).await;
        if report.errors > 0 {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            warn!(errors = report.errors, "decay sweep reported errors, backing off");
        } else {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        }
        report
    }

    /// Drives the sweep loop until cancelled. Intended to be spawned as a
    /// background task; callers abort the task handle on shutdown.
    pub async fn run_forever(&self, mut now_ms_source: impl FnMut() -> i64) -> ! {
        loop {
            tokio::time::sleep(self.current_interval()).await;
            let report = self.sweep_once(now_ms_source()).await;
            info!(
                expired_found = report.expired_found,
                cleaned = report.cleaned,
                "decay sweep complete"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Category, MemoryEntry, MemoryType};
    use crate::store::InMemoryStore;
    use serde_json::Map;

    fn entry_with_expiry(id: &str, expire_at_ms: Option<i64>) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            content: "hi".to_string(),
            node_id: "n".to_string(),
            trace_id: "t".to_string(),
            timestamp_ms: 0,
            importance_score: 0.5,
            memory_type: MemoryType::ShortTerm,
            category: Category::Log,
            metadata: Map::new(),
            vector: None,
            expire_at_ms,
        }
    }

    #[tokio::test]
    async fn dry_run_reports_without_deleting() {
        let store = InMemoryStore::new();
        store.write_entry(entry_with_expiry("a", Some(100))).await.unwrap();

        let report = cleanup_expired_memories(store.as_ref(), true, 1_000).await;
        assert_eq!(report.expired_found, 1);
        assert_eq!(report.cleaned, 0);
        assert!(store.get_entry("a").await.is_some());
    }

    #[tokio::test]
    async fn real_run_deletes_expired_entries() {
        let store = InMemoryStore::new();
        store.write_entry(entry_with_expiry("a", Some(100))).await.unwrap();
        store.write_entry(entry_with_expiry("b", None)).await.unwrap();

        let report = cleanup_expired_memories(store.as_ref(), false, 1_000).await;
        assert_eq!(report.expired_found, 1);
        assert_eq!(report.cleaned, 1);
        assert!(store.get_entry("a").await.is_none());
        assert!(store.get_entry("b").await.is_some());
    }

    #[tokio::test]
    async fn entries_with_no_expiry_are_never_swept() {
        let store = InMemoryStore::new();
        store.write_entry(entry_with_expiry("a", None)).await.unwrap();
        let report = cleanup_expired_memories(store.as_ref(), false, i64::MAX).await;
        assert_eq!(report.expired_found, 0);
    }

    #[test]
    fn interval_backs_off_on_failures_and_caps() {
        let store = InMemoryStore::new();
        let sweeper = DecaySweeper::new(store, 1);
        assert_eq!(sweeper.current_interval(), Duration::from_secs(60));
        sweeper.consecutive_failures.store(2, Ordering::Relaxed);
        assert_eq!(sweeper.current_interval(), Duration::from_secs(240));
        sweeper.consecutive_failures.store(10, Ordering::Relaxed);
        assert_eq!(sweeper.current_interval(), sweeper.max_interval);
    }
}
