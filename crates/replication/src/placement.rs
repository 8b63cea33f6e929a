//! Replica sets and their precomputed placement over a ring.

use std::fmt;
use std::sync::Arc;

use corelib::node::NodeAddress;
use corelib::ring::TokenRing;
use corelib::token::Token;

use crate::strategy::ReplicationStrategy;

/// Unordered set of node addresses holding copies of one partition.
///
/// Stored sorted and deduplicated so that equality, hashing and ordering do
/// not depend on the order the strategy produced the nodes in. Cloning is a
/// reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaSet(Arc<[NodeAddress]>);

impl ReplicaSet {
    pub fn empty() -> Self {
        ReplicaSet(Arc::from(Vec::new()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.0.binary_search(address).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeAddress> + '_ {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[NodeAddress] {
        &self.0
    }

    /// The node that stands for the whole set when one host must be chosen:
    /// the smallest address.
    pub fn representative(&self) -> Option<NodeAddress> {
        self.0.first().copied()
    }
}

impl FromIterator<NodeAddress> for ReplicaSet {
    fn from_iter<I: IntoIterator<Item = NodeAddress>>(iter: I) -> Self {
        let mut nodes: Vec<NodeAddress> = iter.into_iter().collect();
        nodes.sort();
        nodes.dedup();
        ReplicaSet(Arc::from(nodes))
    }
}

impl fmt::Debug for ReplicaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for ReplicaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}")?;
        }
        write!(f, "}}")
    }
}

/// Replica sets for every ring entry, computed once per ring and strategy.
///
/// Lookups are then a binary search plus an `Arc` clone.
#[derive(Clone, Debug)]
pub struct ReplicaPlacement {
    ring: Arc<TokenRing>,
    sets: Vec<ReplicaSet>,
    replication_factor: usize,
}

impl ReplicaPlacement {
    pub fn compute(ring: Arc<TokenRing>, strategy: &dyn ReplicationStrategy) -> Self {
        let sets = (0..ring.len())
            .map(|idx| strategy.replicas(&ring, idx).into_iter().collect())
            .collect();
        Self {
            ring,
            sets,
            replication_factor: strategy.replication_factor(),
        }
    }

    pub fn ring(&self) -> &Arc<TokenRing> {
        &self.ring
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Replica set of the range containing `token`; empty for an empty ring.
    pub fn replicas_for_token(&self, token: Token) -> ReplicaSet {
        self.ring
            .primary_index(token)
            .map(|idx| self.sets[idx].clone())
            .unwrap_or_else(ReplicaSet::empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SimpleStrategy;
    use corelib::node::Node;
    use corelib::ring::RingBuilder;

    fn addr(i: u8) -> NodeAddress {
        format!("10.0.0.{i}").parse().unwrap()
    }

    #[test]
    fn test_set_is_order_independent() {
        let a: ReplicaSet = [addr(3), addr(1), addr(2), addr(1)].into_iter().collect();
        let b: ReplicaSet = [addr(1), addr(2), addr(3)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.representative(), Some(addr(1)));
        assert!(a.contains(&addr(2)));
        assert_eq!(a.to_string(), "{10.0.0.1, 10.0.0.2, 10.0.0.3}");
        assert_eq!(ReplicaSet::empty().representative(), None);
    }

    #[test]
    fn test_placement_matches_strategy() {
        let ring = Arc::new(
            RingBuilder::new()
                .add_node(Node::new(addr(1)), [Token(-100)])
                .add_node(Node::new(addr(2)), [Token(0)])
                .add_node(Node::new(addr(3)), [Token(100)])
                .build()
                .unwrap(),
        );
        let strategy = SimpleStrategy::new(2).unwrap();
        let placement = ReplicaPlacement::compute(ring.clone(), &strategy);

        for t in [-1000i64, -100, -50, 0, 50, 100, 1000] {
            let expected: ReplicaSet = strategy
                .replicas_for_token(&ring, Token(t))
                .into_iter()
                .collect();
            assert_eq!(placement.replicas_for_token(Token(t)), expected);
        }
        assert_eq!(
            placement.replicas_for_token(Token(50)),
            [addr(3), addr(1)].into_iter().collect()
        );
    }
}
