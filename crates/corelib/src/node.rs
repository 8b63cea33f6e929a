//! Node abstractions for the token ring.
//!
//! Nodes are identified by their network address, which is what a
//! distributed scheduler understands as a placement hint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::Error;

/// Network address of a store node.
///
/// Ordering is the natural `IpAddr` ordering; it is used as the tie-break
/// when a single host has to be picked out of a replica set.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(pub IpAddr);

impl NodeAddress {
    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(NodeAddress)
            .map_err(|e| Error::InvalidNode(format!("{s}: {e}")))
    }
}

impl From<IpAddr> for NodeAddress {
    fn from(ip: IpAddr) -> Self {
        NodeAddress(ip)
    }
}

/// Store node participating in the ring.
///
/// Keep this struct small and cheap to clone; connection state lives with
/// the driver, not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: NodeAddress,
    /// Data center label for topology-aware replication.
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Rack label for rack-aware replication.
    #[serde(default)]
    pub rack: Option<String>,
}

impl Node {
    /// Construct a node with no topology labels.
    pub fn new(address: NodeAddress) -> Self {
        Self {
            address,
            datacenter: None,
            rack: None,
        }
    }

    pub fn with_topology(
        address: NodeAddress,
        datacenter: impl Into<Option<String>>,
        rack: impl Into<Option<String>>,
    ) -> Self {
        Self {
            address,
            datacenter: datacenter.into(),
            rack: rack.into(),
        }
    }
}
