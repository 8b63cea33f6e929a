//! Replication strategies for the token ring.
//!
//! This crate determines, for a ring position:
//! - How many replicas the store keeps
//! - Which nodes hold those replicas
//! - How many acknowledgements a consistency level requires

pub mod consistency;
pub mod error;
pub mod placement;
pub mod strategy;

pub use consistency::ConsistencyLevel;
pub use error::{ReplicationError, Result};
pub use placement::{ReplicaPlacement, ReplicaSet};
pub use strategy::{
    NetworkTopologyStrategy, ReplicationConfig, ReplicationStrategy, SimpleStrategy,
};
