//! Network topology replication strategy.
//!
//! Each datacenter gets its own replica count. Within a datacenter the walk
//! prefers nodes in racks it has not seen yet; nodes in already-seen racks are
//! held back and only used once every rack of that datacenter has been seen.
//!
//! Nodes without a datacenter or rack label are grouped under the empty
//! label.

use std::collections::{BTreeMap, HashMap, HashSet};

use corelib::node::NodeAddress;
use corelib::ring::TokenRing;
use tracing::debug;

use crate::error::{ReplicationError, Result};
use crate::strategy::ReplicationStrategy;

#[derive(Debug, Clone)]
pub struct NetworkTopologyStrategy {
    datacenters: BTreeMap<String, usize>,
}

impl NetworkTopologyStrategy {
    pub fn new(datacenters: BTreeMap<String, usize>) -> Result<Self> {
        if datacenters.is_empty() {
            return Err(ReplicationError::NoDatacenters);
        }
        if let Some((dc, _)) = datacenters.iter().find(|(_, rf)| **rf == 0) {
            return Err(ReplicationError::InvalidReplicationFactor {
                datacenter: Some(dc.clone()),
            });
        }
        Ok(Self { datacenters })
    }

    pub fn datacenters(&self) -> &BTreeMap<String, usize> {
        &self.datacenters
    }
}

/// Selection state for one datacenter during a ring walk.
#[derive(Default)]
struct DcSelection {
    wanted: usize,
    racks_total: usize,
    chosen: Vec<NodeAddress>,
    seen_racks: HashSet<String>,
    skipped: Vec<NodeAddress>,
}

impl DcSelection {
    fn is_done(&self) -> bool {
        self.chosen.len() >= self.wanted
    }

    fn offer(&mut self, node: NodeAddress, rack: &str) {
        if self.is_done() || self.chosen.contains(&node) {
            return;
        }
        if self.seen_racks.len() >= self.racks_total {
            self.chosen.push(node);
            return;
        }
        if self.seen_racks.contains(rack) {
            if !self.skipped.contains(&node) {
                self.skipped.push(node);
            }
            return;
        }
        self.chosen.push(node);
        self.seen_racks.insert(rack.to_string());
        if self.seen_racks.len() >= self.racks_total {
            for held in std::mem::take(&mut self.skipped) {
                if self.is_done() {
                    break;
                }
                if !self.chosen.contains(&held) {
                    self.chosen.push(held);
                }
            }
        }
    }
}

fn label(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

impl ReplicationStrategy for NetworkTopologyStrategy {
    fn replication_factor(&self) -> usize {
        self.datacenters.values().sum()
    }

    fn replicas(&self, ring: &TokenRing, primary_index: usize) -> Vec<NodeAddress> {
        // Per-datacenter node and rack counts cap what can be asked for.
        let mut nodes_per_dc: HashMap<&str, usize> = HashMap::new();
        let mut racks_per_dc: HashMap<&str, HashSet<&str>> = HashMap::new();
        for address in ring.addresses() {
            if let Some(node) = ring.node(address) {
                let dc = label(&node.datacenter);
                *nodes_per_dc.entry(dc).or_default() += 1;
                racks_per_dc.entry(dc).or_default().insert(label(&node.rack));
            }
        }

        let mut selections: HashMap<&str, DcSelection> = HashMap::new();
        for (dc, rf) in &self.datacenters {
            let available = nodes_per_dc.get(dc.as_str()).copied().unwrap_or(0);
            if available == 0 {
                debug!(datacenter = %dc, "datacenter has no nodes in the ring");
                continue;
            }
            selections.insert(
                dc.as_str(),
                DcSelection {
                    wanted: (*rf).min(available),
                    racks_total: racks_per_dc.get(dc.as_str()).map_or(0, |r| r.len()),
                    ..Default::default()
                },
            );
        }

        let mut order = Vec::new();
        for entry in ring.walk_from(primary_index) {
            if selections.values().all(DcSelection::is_done) {
                break;
            }
            let Some(node) = ring.node(&entry.node) else {
                continue;
            };
            let Some(selection) = selections.get_mut(label(&node.datacenter)) else {
                continue;
            };
            let before = selection.chosen.len();
            selection.offer(entry.node, label(&node.rack));
            order.extend_from_slice(&selection.chosen[before..]);
        }

        order
    }

    fn name(&self) -> &'static str {
        "NetworkTopologyStrategy"
    }
}
