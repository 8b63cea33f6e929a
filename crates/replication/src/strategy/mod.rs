//! Replication strategy abstractions.
//!
//! Replication strategies determine how many replicas the store keeps and
//! where it places them on the ring:
//!
//! - **SimpleStrategy**: N replicas placed sequentially around the ring
//! - **NetworkTopologyStrategy**: per-datacenter counts, spread across racks

pub mod network_topology;
pub mod simple;

pub use network_topology::NetworkTopologyStrategy;
pub use simple::SimpleStrategy;

use corelib::node::NodeAddress;
use corelib::ring::TokenRing;
use corelib::token::Token;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::Result;

/// Trait for replication strategies.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync) as they are shared by
/// every task that routes records.
pub trait ReplicationStrategy: Send + Sync + Debug + 'static {
    /// Total number of replicas this strategy places.
    fn replication_factor(&self) -> usize;

    /// Replica nodes for the range owned by ring entry `primary_index`.
    ///
    /// The primary comes first and addresses are distinct. The result has
    /// at most `replication_factor()` entries.
    fn replicas(&self, ring: &TokenRing, primary_index: usize) -> Vec<NodeAddress>;

    /// Replica nodes for an arbitrary token.
    fn replicas_for_token(&self, ring: &TokenRing, token: Token) -> Vec<NodeAddress> {
        match ring.primary_index(token) {
            Some(idx) => self.replicas(ring, idx),
            None => Vec::new(),
        }
    }

    /// Strategy name (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Keyspace replication settings as the store reports them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum ReplicationConfig {
    #[serde(alias = "org.apache.cassandra.locator.SimpleStrategy")]
    SimpleStrategy { replication_factor: usize },
    #[serde(alias = "org.apache.cassandra.locator.NetworkTopologyStrategy")]
    NetworkTopologyStrategy { datacenters: BTreeMap<String, usize> },
}

impl ReplicationConfig {
    /// Validates the settings and builds the strategy.
    pub fn build(&self) -> Result<Box<dyn ReplicationStrategy>> {
        match self {
            ReplicationConfig::SimpleStrategy { replication_factor } => {
                Ok(Box::new(SimpleStrategy::new(*replication_factor)?))
            }
            ReplicationConfig::NetworkTopologyStrategy { datacenters } => {
                Ok(Box::new(NetworkTopologyStrategy::new(datacenters.clone())?))
            }
        }
    }

    pub fn replication_factor(&self) -> usize {
        match self {
            ReplicationConfig::SimpleStrategy { replication_factor } => *replication_factor,
            ReplicationConfig::NetworkTopologyStrategy { datacenters } => {
                datacenters.values().sum()
            }
        }
    }
}
