//! Process-wide topology cache.
//!
//! Readers take the current snapshot under a short read lock and never wait
//! for a refresh that is already running; they keep using the previous
//! snapshot until the refresh swaps in the new one. Refreshes are serialized
//! by a single-writer lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::client::TokenRingClient;
use super::snapshot::ClusterMetadata;
use crate::error::{Error, Result};
use crate::retry::{retry_with_backoff, RetryPolicy};

pub struct TopologyCache {
    client: Arc<dyn TokenRingClient>,
    retry: RetryPolicy,
    current: RwLock<Option<Arc<ClusterMetadata>>>,
    stale: AtomicBool,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl TopologyCache {
    pub fn new(client: Arc<dyn TokenRingClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            current: RwLock::new(None),
            stale: AtomicBool::new(false),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Cached snapshot, if any, without touching the store.
    pub fn current(&self) -> Option<Arc<ClusterMetadata>> {
        self.current.read().clone()
    }

    /// Marks the cached snapshot stale (e.g. after a connection reset). The
    /// next `metadata()` call refreshes it.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Current metadata, fetching it on first use and refreshing it when
    /// invalidated.
    ///
    /// If a refresh is already running and a snapshot exists, the existing
    /// snapshot is returned instead of waiting.
    pub async fn metadata(&self) -> Result<Arc<ClusterMetadata>> {
        if let Some(current) = self.current() {
            if !self.stale.load(Ordering::Acquire) {
                return Ok(current);
            }
            return match self.refresh_lock.try_lock() {
                Ok(_guard) => self.refresh_locked().await,
                Err(_) => {
                    debug!("topology refresh in flight, serving previous snapshot");
                    Ok(current)
                }
            };
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have completed the first fetch while we waited.
        match self.current() {
            Some(current) => Ok(current),
            None => self.refresh_locked().await,
        }
    }

    /// Fetches a new snapshot now, waiting for any refresh in flight first.
    pub async fn refresh(&self) -> Result<Arc<ClusterMetadata>> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Arc<ClusterMetadata>> {
        // Cleared before the fetch: an invalidate() that lands mid-fetch
        // stays set and triggers the next refresh.
        self.stale.store(false, Ordering::Release);
        let result = self.fetch_and_swap().await;
        if result.is_err() {
            self.stale.store(true, Ordering::Release);
        }
        result
    }

    async fn fetch_and_swap(&self) -> Result<Arc<ClusterMetadata>> {
        let client = self.client.clone();
        let snapshot = retry_with_backoff(
            &self.retry,
            "fetch_topology",
            |e: &crate::error::StoreError| e.is_retryable(),
            |_| {
                let client = client.clone();
                async move { client.fetch_topology().await }
            },
        )
        .await
        .map_err(|e| {
            metrics::counter!("topology_refresh_failures_total").increment(1);
            Error::TopologyUnavailable {
                attempts: e.attempts,
                reason: e.last.to_string(),
            }
        })?;

        let fetched = Arc::new(ClusterMetadata::from_snapshot(snapshot)?);
        metrics::counter!("topology_refreshes_total").increment(1);

        let mut current = self.current.write();
        if let Some(existing) = current.as_ref() {
            if existing.version() > fetched.version() {
                warn!(
                    cached = existing.version(),
                    fetched = fetched.version(),
                    "discarding stale topology snapshot"
                );
                return Ok(existing.clone());
            }
        }
        info!(
            version = fetched.version(),
            nodes = fetched.ring().node_count(),
            tokens = fetched.ring().len(),
            "topology snapshot refreshed"
        );
        *current = Some(fetched.clone());
        Ok(fetched)
    }
}

/// Topology caches keyed by cluster name, shared process-wide.
#[derive(Default)]
pub struct ClusterRegistry {
    caches: DashMap<String, Arc<TopologyCache>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache for `cluster`, created with `make` on first use.
    pub fn get_or_insert_with(
        &self,
        cluster: &str,
        make: impl FnOnce() -> TopologyCache,
    ) -> Arc<TopologyCache> {
        self.caches
            .entry(cluster.to_string())
            .or_insert_with(|| Arc::new(make()))
            .clone()
    }

    pub fn get(&self, cluster: &str) -> Option<Arc<TopologyCache>> {
        self.caches.get(cluster).map(|c| c.clone())
    }

    /// Marks every cached snapshot stale.
    pub fn invalidate_all(&self) {
        for cache in self.caches.iter() {
            cache.invalidate();
        }
    }

    pub fn remove(&self, cluster: &str) -> Option<Arc<TopologyCache>> {
        self.caches.remove(cluster).map(|(_, cache)| cache)
    }
}
