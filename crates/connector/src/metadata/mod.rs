//! Cluster topology: what the store reports, how it is fetched, and the
//! process-wide cache that serves it to every partition task.

pub mod cache;
pub mod client;
pub mod snapshot;

pub use cache::{ClusterRegistry, TopologyCache};
pub use client::{StaticTopologyClient, TokenRingClient};
pub use snapshot::{ClusterMetadata, NodeDescriptor, TopologySnapshot};
