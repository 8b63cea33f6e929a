//! Versioned topology snapshots and the validated metadata built from them.

use std::collections::HashMap;
use std::sync::Arc;

use corelib::node::{Node, NodeAddress};
use corelib::partitioner::{partitioner_for_name, Partitioner};
use corelib::ring::{RingEntry, TokenRing};
use corelib::token::Token;
use parking_lot::Mutex;
use replication::ReplicaPlacement;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{KeyspaceDef, TableDef};

fn default_partitioner() -> String {
    "org.apache.cassandra.dht.Murmur3Partitioner".to_string()
}

/// One node as reported by the store's system tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub address: NodeAddress,
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub rack: Option<String>,
    pub tokens: Vec<Token>,
}

/// Raw topology response. `version` grows with every schema or ring change
/// and is used to detect stale responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub version: u64,
    #[serde(default = "default_partitioner")]
    pub partitioner: String,
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub keyspaces: Vec<KeyspaceDef>,
}

/// Validated, immutable view of one topology snapshot.
pub struct ClusterMetadata {
    version: u64,
    partitioner: Arc<dyn Partitioner>,
    ring: Arc<TokenRing>,
    keyspaces: HashMap<String, KeyspaceDef>,
    tables: HashMap<(String, String), Arc<TableDef>>,
    /// Replica placements, computed on first use per keyspace.
    placements: Mutex<HashMap<String, Arc<ReplicaPlacement>>>,
}

impl std::fmt::Debug for ClusterMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterMetadata")
            .field("version", &self.version)
            .field("partitioner", &self.partitioner.name())
            .field("tokens", &self.ring.len())
            .field("nodes", &self.ring.node_count())
            .field("keyspaces", &self.keyspaces.len())
            .finish()
    }
}

impl ClusterMetadata {
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Result<Self> {
        let partitioner = partitioner_for_name(&snapshot.partitioner)?;

        let mut entries = Vec::new();
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for descriptor in snapshot.nodes {
            entries.extend(descriptor.tokens.iter().map(|token| RingEntry {
                token: *token,
                node: descriptor.address,
            }));
            nodes.push(Node::with_topology(
                descriptor.address,
                descriptor.datacenter,
                descriptor.rack,
            ));
        }
        let ring = Arc::new(TokenRing::new(entries, nodes)?);

        let mut keyspaces = HashMap::new();
        let mut tables = HashMap::new();
        for mut keyspace in snapshot.keyspaces {
            for table in &mut keyspace.tables {
                table.keyspace = keyspace.name.clone();
                tables.insert(
                    (keyspace.name.clone(), table.name.clone()),
                    Arc::new(table.clone()),
                );
            }
            keyspaces.insert(keyspace.name.clone(), keyspace);
        }

        Ok(Self {
            version: snapshot.version,
            partitioner,
            ring,
            keyspaces,
            tables,
            placements: Mutex::new(HashMap::new()),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    pub fn ring(&self) -> &Arc<TokenRing> {
        &self.ring
    }

    pub fn keyspace(&self, name: &str) -> Result<&KeyspaceDef> {
        self.keyspaces
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("keyspace `{name}` does not exist")))
    }

    pub fn keyspace_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.keyspaces.keys().map(String::as_str)
    }

    pub fn table(&self, keyspace: &str, table: &str) -> Result<Arc<TableDef>> {
        self.keyspace(keyspace)?;
        self.tables
            .get(&(keyspace.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::Configuration(format!("table `{keyspace}.{table}` does not exist"))
            })
    }

    /// Replica placement for a keyspace's replication settings on this ring.
    pub fn placement(&self, keyspace: &str) -> Result<Arc<ReplicaPlacement>> {
        if let Some(placement) = self.placements.lock().get(keyspace) {
            return Ok(placement.clone());
        }
        let strategy = self.keyspace(keyspace)?.replication.build()?;
        let placement = Arc::new(ReplicaPlacement::compute(self.ring.clone(), strategy.as_ref()));
        self.placements
            .lock()
            .entry(keyspace.to_string())
            .or_insert(placement.clone());
        Ok(placement)
    }
}
