//! Maps records to the store nodes that own their partition.

use std::sync::Arc;

use corelib::partitioner::Partitioner;
use corelib::ring::TokenRing;
use corelib::token::Token;
use replication::{ReplicaPlacement, ReplicaSet};

use crate::error::Result;
use crate::metadata::ClusterMetadata;
use crate::rowio::{PartitionKeyExtractor, RowWriter, RowWriterKeyExtractor};

/// Replica set of a record together with its token.
///
/// The token lets the shuffle spread records that share a replica set over
/// the sub-partitions of their host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReplicaKey {
    pub replicas: ReplicaSet,
    pub token: Token,
}

/// Computes, for any record, the nodes holding a replica of the row it maps
/// to in one table.
pub struct ReplicaMapper<T> {
    keyspace: String,
    table: String,
    partitioner: Arc<dyn Partitioner>,
    placement: Arc<ReplicaPlacement>,
    extractor: Arc<dyn PartitionKeyExtractor<T>>,
}

impl<T> ReplicaMapper<T> {
    /// Fails with `Configuration` if the keyspace or table is unknown.
    pub fn new(
        metadata: &ClusterMetadata,
        keyspace: &str,
        table: &str,
        extractor: Arc<dyn PartitionKeyExtractor<T>>,
    ) -> Result<Self> {
        metadata.table(keyspace, table)?;
        Ok(Self {
            keyspace: keyspace.to_string(),
            table: table.to_string(),
            partitioner: metadata.partitioner().clone(),
            placement: metadata.placement(keyspace)?,
            extractor,
        })
    }

    /// Mapper whose partition keys come from `writer`'s columns.
    pub fn for_row_writer(
        metadata: &ClusterMetadata,
        keyspace: &str,
        table: &str,
        writer: Arc<dyn RowWriter<T>>,
    ) -> Result<Self>
    where
        T: 'static,
    {
        let table_def = metadata.table(keyspace, table)?;
        let extractor = RowWriterKeyExtractor::new(writer, table_def)?;
        Self::new(metadata, keyspace, table, Arc::new(extractor))
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn ring(&self) -> &Arc<TokenRing> {
        self.placement.ring()
    }

    pub fn replication_factor(&self) -> usize {
        self.placement.replication_factor()
    }

    pub fn token_for(&self, record: &T) -> Result<Token> {
        let key = self.extractor.partition_key(record)?;
        Ok(self.partitioner.token(&key))
    }

    /// Nodes holding a replica of `record`'s row. Empty only if the ring is.
    pub fn replicas_for(&self, record: &T) -> Result<ReplicaSet> {
        Ok(self.route(record)?.replicas)
    }

    pub fn route(&self, record: &T) -> Result<ReplicaKey> {
        let token = self.token_for(record)?;
        Ok(ReplicaKey {
            replicas: self.placement.replicas_for_token(token),
            token,
        })
    }

    /// Pairs every record with its replica set, lazily.
    ///
    /// The returned iterator is single-pass: it consumes `records` as it goes,
    /// and restarting it means restarting the source.
    pub fn key_by_replicas<'a, I>(
        &'a self,
        records: I,
    ) -> impl Iterator<Item = Result<(ReplicaSet, T)>> + 'a
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
        T: 'a,
    {
        records
            .into_iter()
            .map(move |record| self.replicas_for(&record).map(|replicas| (replicas, record)))
    }

    /// Routes a whole partition, failing on the first record that cannot be
    /// mapped.
    pub(crate) fn route_all(&self, records: Vec<T>) -> Result<Vec<(ReplicaKey, T)>> {
        records
            .into_iter()
            .map(|record| self.route(&record).map(|key| (key, record)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::Error;
    use crate::metadata::TopologySnapshot;
    use corelib::node::NodeAddress;
    use crate::value::ColumnValue;

    struct IdWriter(Vec<String>);

    impl RowWriter<i32> for IdWriter {
        fn column_names(&self) -> &[String] {
            &self.0
        }

        fn column_value(&self, record: &i32, column: &str) -> Option<ColumnValue> {
            (column == "id").then_some(ColumnValue::Int(*record))
        }
    }

    fn metadata() -> ClusterMetadata {
        let snapshot: TopologySnapshot = serde_json::from_value(serde_json::json!({
            "version": 1,
            "nodes": [
                {"address": "10.0.0.1", "tokens": [-5000000000000000000i64]},
                {"address": "10.0.0.2", "tokens": [0]},
                {"address": "10.0.0.3", "tokens": [5000000000000000000i64]}
            ],
            "keyspaces": [{
                "name": "ks",
                "replication": {"class": "SimpleStrategy", "replication_factor": 2},
                "tables": [{"name": "t", "partition_key": [{"name": "id", "type": "int"}]}]
            }]
        }))
        .unwrap();
        ClusterMetadata::from_snapshot(snapshot).unwrap()
    }

    fn mapper() -> ReplicaMapper<i32> {
        let writer: Arc<dyn RowWriter<i32>> = Arc::new(IdWriter(vec!["id".into()]));
        ReplicaMapper::for_row_writer(&metadata(), "ks", "t", writer).unwrap()
    }

    #[test]
    fn test_token_matches_store_hash() {
        let mapper = mapper();
        assert_eq!(mapper.token_for(&1).unwrap(), Token(-4069959284402364209));
        assert_eq!(mapper.token_for(&3).unwrap(), Token(9010454139840013625));
        assert_eq!(mapper.replication_factor(), 2);
    }

    #[test]
    fn test_replicas_follow_ring_order() {
        let mapper = mapper();
        let addr = |s: &str| -> NodeAddress { s.parse().unwrap() };
        // -4.07e18 falls in (-5e18, 0], owned by .2 then .3.
        let replicas = mapper.replicas_for(&1).unwrap();
        assert_eq!(replicas.as_slice(), &[addr("10.0.0.2"), addr("10.0.0.3")]);
        // 9.01e18 wraps to .1 then .2.
        let replicas = mapper.replicas_for(&3).unwrap();
        assert_eq!(replicas.as_slice(), &[addr("10.0.0.1"), addr("10.0.0.2")]);
    }

    #[test]
    fn test_key_by_replicas_is_lazy_and_ordered() {
        let mapper = mapper();
        let pulled = Cell::new(0);
        let source = [3, 1, 2, 4].into_iter().inspect(|_| pulled.set(pulled.get() + 1));

        let mut keyed = mapper.key_by_replicas(source);
        assert_eq!(pulled.get(), 0);
        let (replicas, record) = keyed.next().unwrap().unwrap();
        assert_eq!(pulled.get(), 1);
        assert_eq!(record, 3);
        assert!(replicas.contains(&"10.0.0.1".parse().unwrap()));

        let (_, record) = keyed.next().unwrap().unwrap();
        assert_eq!(record, 1);
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn test_unknown_table_is_configuration_error() {
        let writer: Arc<dyn RowWriter<i32>> = Arc::new(IdWriter(vec!["id".into()]));
        let result = ReplicaMapper::for_row_writer(&metadata(), "ks", "missing", writer);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
