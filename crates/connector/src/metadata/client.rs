//! Access to the store's topology metadata.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::snapshot::TopologySnapshot;
use crate::error::StoreError;

/// Queries the store's system metadata for ring tokens, node addresses and
/// keyspace replication settings.
#[async_trait]
pub trait TokenRingClient: Send + Sync {
    async fn fetch_topology(&self) -> Result<TopologySnapshot, StoreError>;
}

/// Serves a fixed snapshot, replaceable at runtime.
#[derive(Debug)]
pub struct StaticTopologyClient {
    snapshot: RwLock<TopologySnapshot>,
}

impl StaticTopologyClient {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Replaces the served snapshot, as a topology change would.
    pub fn set(&self, snapshot: TopologySnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

#[async_trait]
impl TokenRingClient for StaticTopologyClient {
    async fn fetch_topology(&self) -> Result<TopologySnapshot, StoreError> {
        Ok(self.snapshot.read().clone())
    }
}
