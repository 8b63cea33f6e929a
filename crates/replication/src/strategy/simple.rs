//! Simple replication strategy.
//!
//! Places N replicas sequentially around the ring (clockwise from the primary).
//!
//! # Algorithm
//!
//! 1. Start at the ring entry owning the token (the primary)
//! 2. Continue clockwise, skipping nodes already chosen
//! 3. Stop after N distinct nodes or one full lap
//!
//! # Performance
//!
//! - **Time**: O(t) worst case for t tokens (one lap), usually O(r)
//! - **Space**: O(r) - returns Vec of node addresses

use std::collections::HashSet;

use corelib::node::NodeAddress;
use corelib::ring::TokenRing;

use crate::error::{ReplicationError, Result};
use crate::strategy::ReplicationStrategy;

/// Simple replication strategy: N replicas placed sequentially around the ring.
#[derive(Debug, Clone)]
pub struct SimpleStrategy {
    /// Number of replicas to create (including primary).
    replication_factor: usize,
}

impl SimpleStrategy {
    /// Create a new simple strategy with the given replication factor.
    pub fn new(replication_factor: usize) -> Result<Self> {
        if replication_factor == 0 {
            return Err(ReplicationError::InvalidReplicationFactor { datacenter: None });
        }
        Ok(Self { replication_factor })
    }
}

impl ReplicationStrategy for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replicas(&self, ring: &TokenRing, primary_index: usize) -> Vec<NodeAddress> {
        let wanted = self.replication_factor.min(ring.node_count());
        let mut replicas = Vec::with_capacity(wanted);
        let mut seen_nodes = HashSet::with_capacity(wanted);

        for entry in ring.walk_from(primary_index) {
            if replicas.len() >= wanted {
                break;
            }
            if seen_nodes.insert(entry.node) {
                replicas.push(entry.node);
            }
        }

        replicas
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
    }
}
