//! Token ring data structure.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::node::{Node, NodeAddress};
use crate::token::Token;

/// One `(token, owner)` pair of the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingEntry {
    pub token: Token,
    pub node: NodeAddress,
}

/// Immutable token ring snapshot.
///
/// # Invariants
///
/// - `entries` is sorted by token and tokens are strictly increasing
/// - every entry's node has metadata in `nodes`
#[derive(Clone, Debug, Default)]
pub struct TokenRing {
    entries: Vec<RingEntry>,
    nodes: HashMap<NodeAddress, Node>,
    /// Distinct addresses, ascending.
    addresses: Vec<NodeAddress>,
}

impl TokenRing {
    /// Builds a ring from unordered entries and node metadata.
    pub fn new(
        mut entries: Vec<RingEntry>,
        nodes: impl IntoIterator<Item = Node>,
    ) -> Result<Self> {
        let nodes: HashMap<NodeAddress, Node> =
            nodes.into_iter().map(|n| (n.address, n)).collect();

        entries.sort_by_key(|e| e.token);
        for pair in entries.windows(2) {
            if pair[0].token == pair[1].token {
                return Err(Error::DuplicateToken {
                    token: pair[0].token,
                    first: pair[0].node,
                    second: pair[1].node,
                });
            }
        }
        for entry in &entries {
            if !nodes.contains_key(&entry.node) {
                return Err(Error::UnknownNode {
                    token: entry.token,
                    node: entry.node,
                });
            }
        }

        let addresses: Vec<NodeAddress> = entries
            .iter()
            .map(|e| e.node)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            entries,
            nodes,
            addresses,
        })
    }

    /// An empty ring. Every lookup against it yields nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tokens on the ring.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[RingEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&RingEntry> {
        self.entries.get(index)
    }

    /// Index of the entry owning `token`: the first entry whose token is
    /// `>= token`, wrapping to 0 past the last entry.
    ///
    /// Returns `None` for an empty ring.
    pub fn primary_index(&self, token: Token) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.entries.partition_point(|e| e.token < token);
        Some(if idx == self.entries.len() { 0 } else { idx })
    }

    /// Primary owner of `token`.
    pub fn primary_owner(&self, token: Token) -> Option<NodeAddress> {
        self.primary_index(token).map(|i| self.entries[i].node)
    }

    /// One clockwise lap over the ring starting at `start`.
    pub fn walk_from(&self, start: usize) -> impl Iterator<Item = &RingEntry> + '_ {
        let len = self.entries.len();
        (0..len).map(move |i| &self.entries[(start + i) % len])
    }

    /// Distinct node addresses in ascending order.
    pub fn addresses(&self) -> &[NodeAddress] {
        &self.addresses
    }

    pub fn node(&self, address: &NodeAddress) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn node_count(&self) -> usize {
        self.addresses.len()
    }
}

/// Incremental construction of a [`TokenRing`].
#[derive(Debug, Default)]
pub struct RingBuilder {
    entries: Vec<RingEntry>,
    nodes: Vec<Node>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node owning the given tokens.
    pub fn add_node(mut self, node: Node, tokens: impl IntoIterator<Item = Token>) -> Self {
        let address = node.address;
        self.entries
            .extend(tokens.into_iter().map(|token| RingEntry { token, node: address }));
        self.nodes.push(node);
        self
    }

    pub fn build(self) -> Result<TokenRing> {
        TokenRing::new(self.entries, self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NodeAddress {
        s.parse().unwrap()
    }

    fn three_node_ring() -> TokenRing {
        RingBuilder::new()
            .add_node(Node::new(addr("10.0.0.1")), [Token(-100)])
            .add_node(Node::new(addr("10.0.0.2")), [Token(0)])
            .add_node(Node::new(addr("10.0.0.3")), [Token(100)])
            .build()
            .unwrap()
    }

    #[test]
    fn test_primary_lookup_inclusive_and_wrapping() {
        let ring = three_node_ring();
        assert_eq!(ring.primary_owner(Token(-100)), Some(addr("10.0.0.1")));
        assert_eq!(ring.primary_owner(Token(-99)), Some(addr("10.0.0.2")));
        assert_eq!(ring.primary_owner(Token(0)), Some(addr("10.0.0.2")));
        assert_eq!(ring.primary_owner(Token(50)), Some(addr("10.0.0.3")));
        assert_eq!(ring.primary_owner(Token(101)), Some(addr("10.0.0.1")));
        assert_eq!(ring.primary_owner(Token::MIN), Some(addr("10.0.0.1")));
    }

    #[test]
    fn test_walk_is_one_lap() {
        let ring = three_node_ring();
        let walked: Vec<_> = ring.walk_from(2).map(|e| e.token).collect();
        assert_eq!(walked, vec![Token(100), Token(-100), Token(0)]);
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let result = RingBuilder::new()
            .add_node(Node::new(addr("10.0.0.1")), [Token(5)])
            .add_node(Node::new(addr("10.0.0.2")), [Token(5)])
            .build();
        assert!(matches!(result, Err(Error::DuplicateToken { .. })));
    }

    #[test]
    fn test_unknown_node_rejected() {
        let entries = vec![RingEntry {
            token: Token(1),
            node: addr("10.0.0.9"),
        }];
        let result = TokenRing::new(entries, Vec::new());
        assert!(matches!(result, Err(Error::UnknownNode { .. })));
    }

    #[test]
    fn test_empty_ring() {
        let ring = TokenRing::empty();
        assert!(ring.is_empty());
        assert_eq!(ring.primary_index(Token(0)), None);
        assert_eq!(ring.walk_from(0).count(), 0);
    }
}
