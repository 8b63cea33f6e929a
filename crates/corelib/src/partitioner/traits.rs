//! Core partitioner trait definitions.

use crate::token::Token;

/// A partitioner converts serialized partition keys into ring tokens.
///
/// Partitioners are stateless and thread-safe, allowing concurrent
/// token generation without synchronization overhead.
pub trait Partitioner: Send + Sync + 'static {
    /// Converts a serialized partition key into a token.
    fn token(&self, key: &[u8]) -> Token;

    /// Returns the name of this partitioner.
    fn name(&self) -> &'static str;
}
