//! Errors raised while building replication strategies.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// Replication factor of zero.
    #[error("replication factor must be at least 1 (datacenter: {datacenter:?})")]
    InvalidReplicationFactor { datacenter: Option<String> },

    /// Network topology strategy without any datacenter.
    #[error("network topology strategy names no datacenters")]
    NoDatacenters,
}
