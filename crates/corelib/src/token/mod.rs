//! Token abstraction module.
//!
//! Tokens are positions on the hash ring. The store this crate targets uses
//! signed 64-bit Murmur3 tokens, so that is the only representation here.

pub mod murmur3;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position on the Murmur3 token ring.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub i64);

impl Token {
    /// Minimum token value (start of ring). Never produced by hashing.
    pub const MIN: Token = Token(i64::MIN);
    /// Maximum token value (end of ring).
    pub const MAX: Token = Token(i64::MAX);

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Clockwise distance from `self` to `other` on the ring.
    ///
    /// Equal tokens are a full lap apart.
    pub fn distance_to(&self, other: &Token) -> u128 {
        let from = self.0 as i128;
        let to = other.0 as i128;
        if to > from {
            (to - from) as u128
        } else {
            (RING_SIZE as i128 - (from - to)) as u128
        }
    }
}

/// Number of distinct positions on the ring.
pub const RING_SIZE: u128 = 1u128 << 64;

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Token {
    fn from(v: i64) -> Self {
        Token(v)
    }
}
