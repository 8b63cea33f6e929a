//! Murmur3 partitioner implementation.

use crate::partitioner::traits::Partitioner;
use crate::token::murmur3::murmur3_x64_128;
use crate::token::Token;

/// Murmur3 partitioner (Cassandra-compatible).
///
/// The token is the first half of the 128-bit hash. `i64::MIN` is reserved
/// as the ring minimum, so a hash landing on it is folded onto `i64::MAX`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Murmur3Partitioner;

impl Partitioner for Murmur3Partitioner {
    fn token(&self, key: &[u8]) -> Token {
        let (h1, _) = murmur3_x64_128(key);
        if h1 == i64::MIN {
            Token::MAX
        } else {
            Token(h1)
        }
    }

    fn name(&self) -> &'static str {
        "Murmur3Partitioner"
    }
}
