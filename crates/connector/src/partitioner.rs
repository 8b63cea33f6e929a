//! Host-affine shuffle partitioner.
//!
//! Every host known to the ring owns a contiguous block of
//! `partitions_per_host` output partitions. A replica set is routed to the
//! block of its representative, the smallest address in the set, and spread
//! inside the block by a hash of the full key. The guarantee is host
//! affinity, not that equal keys share one partition.

use std::collections::HashMap;
use std::net::IpAddr;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use corelib::node::NodeAddress;
use corelib::ring::TokenRing;
use replication::ReplicaSet;
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::dataset::ShufflePartitioner;
use crate::error::{Error, Result};
use crate::mapper::ReplicaKey;

/// Partition the shuffle sends records to when no known host owns them.
pub const FALLBACK_PARTITION: usize = 0;

/// Fixed mapping from host to a contiguous block of partition indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostPartitionAssignment {
    hosts: Vec<NodeAddress>,
    index: HashMap<NodeAddress, usize>,
    partitions_per_host: usize,
}

impl HostPartitionAssignment {
    pub fn new(
        hosts: impl IntoIterator<Item = NodeAddress>,
        partitions_per_host: usize,
    ) -> Result<Self> {
        if partitions_per_host == 0 {
            return Err(Error::Configuration(
                "partitions_per_host must be at least 1".into(),
            ));
        }
        let mut hosts: Vec<NodeAddress> = hosts.into_iter().collect();
        hosts.sort();
        hosts.dedup();
        let index = hosts.iter().enumerate().map(|(i, h)| (*h, i)).collect();
        Ok(Self {
            hosts,
            index,
            partitions_per_host,
        })
    }

    pub fn hosts(&self) -> &[NodeAddress] {
        &self.hosts
    }

    pub fn partitions_per_host(&self) -> usize {
        self.partitions_per_host
    }

    /// Total output partitions; a single fallback partition if no host is
    /// known.
    pub fn num_partitions(&self) -> usize {
        (self.hosts.len() * self.partitions_per_host).max(1)
    }

    pub fn block(&self, host: &NodeAddress) -> Option<Range<usize>> {
        self.index.get(host).map(|i| {
            let start = i * self.partitions_per_host;
            start..start + self.partitions_per_host
        })
    }

    pub fn host_of(&self, partition: usize) -> Option<NodeAddress> {
        self.hosts.get(partition / self.partitions_per_host).copied()
    }
}

/// Shuffle partitioner keyed by replica sets.
#[derive(Debug)]
pub struct ReplicaPartitioner {
    assignment: HostPartitionAssignment,
    fallback_routed: AtomicU64,
}

impl ReplicaPartitioner {
    /// Assigns blocks to every node of `ring`.
    pub fn new(ring: &TokenRing, partitions_per_host: usize) -> Result<Self> {
        let assignment =
            HostPartitionAssignment::new(ring.addresses().iter().copied(), partitions_per_host)?;
        Ok(Self::from_assignment(assignment))
    }

    pub fn from_assignment(assignment: HostPartitionAssignment) -> Self {
        Self {
            assignment,
            fallback_routed: AtomicU64::new(0),
        }
    }

    pub fn assignment(&self) -> &HostPartitionAssignment {
        &self.assignment
    }

    /// Keys routed to the fallback partition so far. Non-zero means the
    /// topology did not cover every record.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_routed.load(Ordering::Relaxed)
    }

    fn place(&self, replicas: &ReplicaSet, spread: u64) -> usize {
        // Smallest address the assignment knows; the set is sorted.
        let block = replicas.iter().find_map(|node| self.assignment.block(node));
        match block {
            Some(block) => block.start + (spread % block.len() as u64) as usize,
            None => {
                let before = self.fallback_routed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("replica_partitioner_fallback_total").increment(1);
                if before == 0 {
                    warn!(
                        replicas = %replicas,
                        "no known host owns replica set, routing to fallback partition"
                    );
                }
                FALLBACK_PARTITION
            }
        }
    }
}

fn hash_replicas(replicas: &ReplicaSet, extra: &[u8]) -> u64 {
    let mut bytes = Vec::with_capacity(replicas.len() * 16 + extra.len());
    for node in replicas.iter() {
        match node.ip() {
            IpAddr::V4(ip) => bytes.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => bytes.extend_from_slice(&ip.octets()),
        }
    }
    bytes.extend_from_slice(extra);
    xxh3_64(&bytes)
}

impl ShufflePartitioner<ReplicaSet> for ReplicaPartitioner {
    fn num_partitions(&self) -> usize {
        self.assignment.num_partitions()
    }

    fn partition_index(&self, key: &ReplicaSet) -> usize {
        self.place(key, hash_replicas(key, &[]))
    }

    fn preferred_hosts(&self, partition: usize) -> Vec<NodeAddress> {
        self.assignment.host_of(partition).into_iter().collect()
    }
}

impl ShufflePartitioner<ReplicaKey> for ReplicaPartitioner {
    fn num_partitions(&self) -> usize {
        self.assignment.num_partitions()
    }

    fn partition_index(&self, key: &ReplicaKey) -> usize {
        let spread = hash_replicas(&key.replicas, &key.token.value().to_be_bytes());
        self.place(&key.replicas, spread)
    }

    fn preferred_hosts(&self, partition: usize) -> Vec<NodeAddress> {
        self.assignment.host_of(partition).into_iter().collect()
    }
}
