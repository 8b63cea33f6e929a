//! Minimal partitioned collection standing in for the host execution
//! engine's distributed dataset.
//!
//! Each partition carries the hosts it would prefer to be scheduled on; the
//! engine is free to ignore them.

use corelib::node::NodeAddress;

#[derive(Clone, Debug, PartialEq)]
pub struct Partition<T> {
    pub index: usize,
    pub preferred_hosts: Vec<NodeAddress>,
    pub records: Vec<T>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionedDataset<T> {
    partitions: Vec<Partition<T>>,
}

/// Maps keys to output partitions during a shuffle.
pub trait ShufflePartitioner<K>: Send + Sync {
    fn num_partitions(&self) -> usize;

    /// Output partition for `key`, in `0..num_partitions()`.
    fn partition_index(&self, key: &K) -> usize;

    /// Scheduling hint for an output partition.
    fn preferred_hosts(&self, _partition: usize) -> Vec<NodeAddress> {
        Vec::new()
    }
}

impl<T> PartitionedDataset<T> {
    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        Self {
            partitions: partitions
                .into_iter()
                .enumerate()
                .map(|(index, records)| Partition {
                    index,
                    preferred_hosts: Vec::new(),
                    records,
                })
                .collect(),
        }
    }

    /// Splits `records` into `num_partitions` contiguous chunks.
    pub fn from_records(records: Vec<T>, num_partitions: usize) -> Self {
        let num_partitions = num_partitions.max(1);
        let chunk = records.len().div_ceil(num_partitions).max(1);
        let mut partitions: Vec<Vec<T>> = (0..num_partitions).map(|_| Vec::new()).collect();
        for (i, record) in records.into_iter().enumerate() {
            partitions[i / chunk].push(record);
        }
        Self::from_partitions(partitions)
    }

    pub(crate) fn from_parts(partitions: Vec<Partition<T>>) -> Self {
        Self { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn partitions(&self) -> &[Partition<T>] {
        &self.partitions
    }

    pub fn into_partitions(self) -> Vec<Partition<T>> {
        self.partitions
    }

    /// All records, partition by partition.
    pub fn into_records(self) -> Vec<T> {
        self.partitions
            .into_iter()
            .flat_map(|p| p.records)
            .collect()
    }

    /// Applies `f` to every partition's records, keeping placement hints.
    pub fn map_partitions<U>(self, mut f: impl FnMut(usize, Vec<T>) -> Vec<U>) -> PartitionedDataset<U> {
        PartitionedDataset {
            partitions: self
                .partitions
                .into_iter()
                .map(|p| Partition {
                    index: p.index,
                    preferred_hosts: p.preferred_hosts,
                    records: f(p.index, p.records),
                })
                .collect(),
        }
    }

    /// Re-partitions by a key derived from every record.
    pub fn partition_by<K, P>(self, key: impl Fn(&T) -> K, partitioner: &P) -> Self
    where
        P: ShufflePartitioner<K> + ?Sized,
    {
        let keyed = self
            .partitions
            .into_iter()
            .map(|p| p.records.into_iter().map(|r| (key(&r), r)).collect())
            .collect();
        Self::shuffle(keyed, partitioner)
    }

    /// Shuffles keyed records into `partitioner`'s layout and drops the keys.
    ///
    /// Records keep their relative input order within each output partition,
    /// so the same input and partitioner always give the same layout.
    pub fn shuffle<K, P>(keyed: Vec<Vec<(K, T)>>, partitioner: &P) -> Self
    where
        P: ShufflePartitioner<K> + ?Sized,
    {
        let n = partitioner.num_partitions();
        let mut buckets: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
        for (key, record) in keyed.into_iter().flatten() {
            buckets[partitioner.partition_index(&key)].push(record);
        }
        Self {
            partitions: buckets
                .into_iter()
                .enumerate()
                .map(|(index, records)| Partition {
                    index,
                    preferred_hosts: partitioner.preferred_hosts(index),
                    records,
                })
                .collect(),
        }
    }
}
