//! Error types for the connector.
//!
//! Structural errors (`SchemaMismatch`, `Configuration`) are never retried
//! and carry enough context to diagnose without re-running the job.
//! Transport errors are retried locally before they surface as
//! `TopologyUnavailable` or `StoreUnavailable`.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A record cannot be mapped onto the target table's columns.
    #[error("schema mismatch on {keyspace}.{table}, column `{column}`: {reason}")]
    SchemaMismatch {
        keyspace: String,
        table: String,
        column: String,
        reason: String,
    },

    /// Ring metadata could not be fetched or refreshed.
    #[error("topology unavailable after {attempts} attempt(s): {reason}")]
    TopologyUnavailable { attempts: u32, reason: String },

    /// A single-partition request kept failing after all retries.
    #[error("store unavailable for {keyspace}.{table} key {key} after {attempts} attempt(s): {reason}")]
    StoreUnavailable {
        keyspace: String,
        table: String,
        key: String,
        attempts: u32,
        reason: String,
    },

    /// Invalid settings or unknown keyspace/table, raised before any data moves.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The bulk writer rejected a batch.
    #[error("write to {keyspace}.{table} failed: {reason}")]
    WriteFailed {
        keyspace: String,
        table: String,
        reason: String,
    },

    /// One partition task failed; the others were cancelled.
    #[error("partition {partition} failed: {source}")]
    PartitionFailed {
        partition: usize,
        #[source]
        source: Box<Error>,
    },

    /// The enclosing job was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn schema(
        keyspace: &str,
        table: &str,
        column: &str,
        reason: impl Into<String>,
    ) -> Self {
        Error::SchemaMismatch {
            keyspace: keyspace.to_string(),
            table: table.to_string(),
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that the execution engine may retry by re-running the
    /// owning partition.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TopologyUnavailable { .. } | Error::StoreUnavailable { .. } => true,
            Error::PartitionFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<corelib::Error> for Error {
    fn from(err: corelib::Error) -> Self {
        match err {
            corelib::Error::UnsupportedPartitioner(_) => Error::Configuration(err.to_string()),
            other => Error::TopologyUnavailable {
                attempts: 1,
                reason: other.to_string(),
            },
        }
    }
}

impl From<replication::ReplicationError> for Error {
    fn from(err: replication::ReplicationError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Transport-level failure reported by the store driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No connection or the coordinator did not respond.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete within its timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The coordinator shed load.
    #[error("overloaded: {0}")]
    Overloaded(String),

    /// The store rejected the request itself; retrying cannot help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::InvalidRequest(_))
    }
}
