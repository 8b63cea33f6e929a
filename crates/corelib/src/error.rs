//! Error types for the core library.

use thiserror::Error;

use crate::node::NodeAddress;
use crate::token::Token;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two ring entries claim the same token.
    #[error("duplicate token {token} claimed by {first} and {second}")]
    DuplicateToken {
        token: Token,
        first: NodeAddress,
        second: NodeAddress,
    },

    /// A ring entry refers to a node without metadata.
    #[error("ring entry for token {token} refers to unknown node {node}")]
    UnknownNode { token: Token, node: NodeAddress },

    /// The declared partitioner is not one this library can reproduce.
    #[error("unsupported partitioner: {0}")]
    UnsupportedPartitioner(String),

    /// Invalid node configuration.
    #[error("invalid node: {0}")]
    InvalidNode(String),
}
