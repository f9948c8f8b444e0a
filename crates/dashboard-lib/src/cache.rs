//! Read-through cache over control-plane reads
//!
//! Each read operation gets its own [`Memo`] table. A table maps call
//! arguments to a shared slot; the first reader of a key runs the fetch and
//! every concurrent reader of the same key awaits that one fetch. Different
//! keys live in different slots and never wait on each other.
//!
//! Invalidation removes slots from the table. A fetch that was in flight when
//! its slot was removed still completes, but stores into the detached slot,
//! so its result is never served to later readers.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::models::{NodeMetricSample, PodSummary, Workload};
use crate::observability::DashboardMetrics;

/// Cached read operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    Workloads,
    PodsByWorkload,
    NodeMetrics,
    PodLogs,
}

impl CacheOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOp::Workloads => "workloads",
            CacheOp::PodsByWorkload => "pods_by_workload",
            CacheOp::NodeMetrics => "node_metrics",
            CacheOp::PodLogs => "pod_logs",
        }
    }
}

/// Key for the pods-by-workload table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

/// Key for the pod-log table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub namespace: String,
    pub pod_name: String,
    pub container: Option<String>,
}

/// Single memoized read operation
pub struct Memo<K, V> {
    op: CacheOp,
    entries: DashMap<K, Arc<OnceCell<V>>>,
    metrics: DashboardMetrics,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(op: CacheOp, metrics: DashboardMetrics) -> Self {
        Self {
            op,
            entries: DashMap::new(),
            metrics,
        }
    }

    /// Return the memoized value for `key`, fetching it on a miss.
    ///
    /// Failed fetches are not stored and their slot is dropped; the next
    /// reader retries.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // The shard guard is released at the end of this statement, before
        // any await point.
        let slot = self.entries.entry(key.clone()).or_default().clone();

        if let Some(value) = slot.get() {
            self.metrics.inc_cache_hit(self.op.as_str());
            return Ok(value.clone());
        }

        self.metrics.inc_cache_miss(self.op.as_str());
        match slot.get_or_try_init(fetch).await {
            Ok(value) => Ok(value.clone()),
            Err(e) => {
                // Drop this call's slot only if it is still in place and empty.
                self.entries.remove_if(&key, |_, current| {
                    Arc::ptr_eq(current, &slot) && !current.initialized()
                });
                Err(e)
            }
        }
    }

    /// Drop every entry in this table
    pub fn invalidate(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(op = self.op.as_str(), dropped, "Cache invalidated");
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The four read caches shared by request handlers and the monitor
pub struct ReadCache {
    pub workloads: Memo<(), Vec<Workload>>,
    pub pods_by_workload: Memo<WorkloadKey, Vec<PodSummary>>,
    pub node_metrics: Memo<(), Vec<NodeMetricSample>>,
    pub pod_logs: Memo<LogKey, String>,
}

impl ReadCache {
    pub fn new(metrics: DashboardMetrics) -> Self {
        Self {
            workloads: Memo::new(CacheOp::Workloads, metrics.clone()),
            pods_by_workload: Memo::new(CacheOp::PodsByWorkload, metrics.clone()),
            node_metrics: Memo::new(CacheOp::NodeMetrics, metrics.clone()),
            pod_logs: Memo::new(CacheOp::PodLogs, metrics),
        }
    }

    /// Drop all entries of one operation
    pub fn invalidate(&self, op: CacheOp) {
        match op {
            CacheOp::Workloads => self.workloads.invalidate(),
            CacheOp::PodsByWorkload => self.pods_by_workload.invalidate(),
            CacheOp::NodeMetrics => self.node_metrics.invalidate(),
            CacheOp::PodLogs => self.pod_logs.invalidate(),
        }
    }

    /// Drop the caches a mutation can make stale. Logs are left alone.
    pub fn invalidate_reads(&self) {
        self.invalidate(CacheOp::Workloads);
        self.invalidate(CacheOp::PodsByWorkload);
        self.invalidate(CacheOp::NodeMetrics);
    }

    pub fn invalidate_all(&self) {
        self.invalidate_reads();
        self.invalidate(CacheOp::PodLogs);
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new(DashboardMetrics::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn memo() -> Memo<String, u32> {
        Memo::new(CacheOp::Workloads, DashboardMetrics::new())
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let memo = memo();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Result<u32, ()> = memo
                .get_or_fetch("a".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let memo = memo();
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(1)
        };

        memo.get_or_fetch("a".to_string(), fetch).await.unwrap();
        memo.invalidate();
        assert!(memo.is_empty());
        memo.get_or_fetch("a".to_string(), fetch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_memoized() {
        let memo = memo();

        let first: Result<u32, &str> = memo
            .get_or_fetch("a".to_string(), || async { Err("boom") })
            .await;
        assert_eq!(first, Err("boom"));

        let second: Result<u32, &str> = memo
            .get_or_fetch("a".to_string(), || async { Ok(3) })
            .await;
        assert_eq!(second, Ok(3));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_slot() {
        let memo = memo();

        for key in ["gone-1", "gone-2", "gone-3"] {
            let result: Result<u32, &str> = memo
                .get_or_fetch(key.to_string(), || async { Err("not found") })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(memo.entries.len(), 0);
        assert!(memo.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let memo = memo();

        let a: Result<u32, ()> = memo.get_or_fetch("a".to_string(), || async { Ok(1) }).await;
        let b: Result<u32, ()> = memo.get_or_fetch("b".to_string(), || async { Ok(2) }).await;

        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(memo.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_readers_share_one_fetch() {
        let memo = Arc::new(memo());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let memo = memo.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                memo.get_or_fetch("shared".to_string(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, ()>(42)
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_is_not_served_after_invalidation() {
        let memo = Arc::new(memo());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let memo = memo.clone();
            tokio::spawn(async move {
                memo.get_or_fetch("k".to_string(), || async move {
                    release_rx.await.ok();
                    Ok::<_, ()>(1)
                })
                .await
            })
        };

        // Let the slow fetch claim its slot before invalidating.
        tokio::time::sleep(Duration::from_millis(10)).await;
        memo.invalidate();
        release_tx.send(()).unwrap();
        assert_eq!(slow.await.unwrap(), Ok(1));

        let fresh: Result<u32, ()> = memo.get_or_fetch("k".to_string(), || async { Ok(2) }).await;
        assert_eq!(fresh, Ok(2));
    }

    #[tokio::test]
    async fn test_invalidate_reads_keeps_logs() {
        let cache = ReadCache::default();
        let key = LogKey {
            namespace: "default".to_string(),
            pod_name: "web-0".to_string(),
            container: None,
        };

        cache
            .workloads
            .get_or_fetch((), || async { Ok::<_, ()>(vec![]) })
            .await
            .unwrap();
        cache
            .pod_logs
            .get_or_fetch(key, || async { Ok::<_, ()>("line".to_string()) })
            .await
            .unwrap();

        cache.invalidate_reads();
        assert!(cache.workloads.is_empty());
        assert_eq!(cache.pod_logs.len(), 1);

        cache.invalidate_all();
        assert!(cache.pod_logs.is_empty());
    }
}
