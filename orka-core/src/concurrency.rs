//! Bounded-concurrency task runner with per-call timeout and cooperative
//! cancellation (§4.2). Every node that wants to enforce its own timeout,
//! and the scheduler's Fork branch runner, go through this.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{CoreError, Result};

/// Admits at most `max_concurrency` concurrent tasks; excess callers wait
/// on the semaphore. Tracks outstanding tasks by a locally-assigned id so
/// [`ConcurrencyManager::shutdown`] can abort them all.
pub struct ConcurrencyManager {
    semaphore: Arc<Semaphore>,
    active: Arc<DashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl ConcurrencyManager {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            active: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `fut` under a concurrency permit, enforcing `timeout` if given.
    /// The permit is released on every exit path (success, error inside
    /// `fut`, or timeout) because it is held by the guard returned from
    /// `acquire_owned`, which drops at the end of this call regardless of
    /// how we return.
    pub async fn run_with_timeout<F, T>(&self, fut: F, timeout: Option<Duration>) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed");

        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = self.active.clone();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let result = fut.await;
            let _ = tx.send(result);
        });
        active.insert(task_id, handle);

        let outcome = match timeout {
            Some(d) => tokio::time::timeout(d, rx).await,
            None => Ok(rx.await),
        };

        self.active.remove(&task_id);

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_canceled)) => Err(CoreError::Timeout {
                operation: "run_with_timeout".to_string(),
                duration_ms: timeout.map(|d| d.as_millis() as u64).unwrap_or(0),
            }),
            Err(_elapsed) => {
                if let Some((_, handle)) = self.active.remove(&task_id) {
                    handle.abort();
                }
                Err(CoreError::Timeout {
                    operation: "run_with_timeout".to_string(),
                    duration_ms: timeout.map(|d| d.as_millis() as u64).unwrap_or(0),
                })
            }
        }
    }

    /// Cancel every outstanding task. Permits are released as the aborted
    /// tasks' guards drop.
    pub fn shutdown(&self) {
        for entry in self.active.iter() {
            entry.value().abort();
        }
        self.active.clear();
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_to_completion_under_limit() {
        let mgr = ConcurrencyManager::new(2);
        let out = mgr.run_with_timeout(async { 42 }, None).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn times_out_slow_tasks() {
        let mgr = ConcurrencyManager::new(1);
        let result = mgr
            .run_with_timeout(
                async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    1
                },
                Some(Duration::from_millis(10)),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bounds_parallelism() {
        let mgr = Arc::new(ConcurrencyManager::new(2));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let mgr = mgr.clone();
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                mgr.run_with_timeout(
                    async move {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                    },
                    None,
                )
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn shutdown_aborts_active_tasks() {
        let mgr = Arc::new(ConcurrencyManager::new(4));
        let mgr2 = mgr.clone();
        let handle = tokio::spawn(async move {
            mgr2.run_with_timeout(
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                },
                None,
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(mgr.active_count(), 1);
        mgr.shutdown();
        let _ = handle.await;
    }
}
