//! Core library for token-ring routing.
//!
//! This crate provides the fundamental abstractions for consistent hashing
//! against a partitioned store:
//! - Murmur3 tokens, bit-compatible with the store
//! - Partitioner algorithms
//! - Node addresses and metadata
//! - The token ring and its lookup operations
//! - Token range and ownership views

pub mod error;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod token;
pub mod topology;

pub use error::{Error, Result};
pub use node::{Node, NodeAddress};
pub use partitioner::{partitioner_for_name, Murmur3Partitioner, Partitioner};
pub use ring::{RingBuilder, RingEntry, TokenRing};
pub use token::Token;
pub use topology::TokenRange;
