//! Ring topology views: token ranges and ownership.

use std::collections::BTreeMap;

use crate::node::NodeAddress;
use crate::ring::TokenRing;
use crate::token::{Token, RING_SIZE};

/// Half-open token range `(start, end]`, wrapping when `start >= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenRange {
    pub start: Token,
    pub end: Token,
}

impl TokenRange {
    pub fn new(start: Token, end: Token) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, token: Token) -> bool {
        if self.start < self.end {
            token > self.start && token <= self.end
        } else {
            token > self.start || token <= self.end
        }
    }

    /// Number of tokens covered by the range.
    pub fn width(&self) -> u128 {
        self.start.distance_to(&self.end)
    }
}

/// The range each ring entry owns as primary, in ring order.
pub fn primary_ranges(ring: &TokenRing) -> Vec<(TokenRange, NodeAddress)> {
    let entries = ring.entries();
    let len = entries.len();
    (0..len)
        .map(|i| {
            let prev = entries[(i + len - 1) % len].token;
            (TokenRange::new(prev, entries[i].token), entries[i].node)
        })
        .collect()
}

/// Fraction of the hash space each node owns as primary.
pub fn ownership(ring: &TokenRing) -> BTreeMap<NodeAddress, f64> {
    let mut owned: BTreeMap<NodeAddress, u128> = BTreeMap::new();
    for (range, node) in primary_ranges(ring) {
        *owned.entry(node).or_default() += range.width();
    }
    owned
        .into_iter()
        .map(|(node, width)| (node, width as f64 / RING_SIZE as f64))
        .collect()
}
