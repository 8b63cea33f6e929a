//! Reshapes a dataset so that its partitions are host-affine.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dataset::PartitionedDataset;
use crate::error::{Error, Result};
use crate::join::JoinSpec;
use crate::mapper::{ReplicaKey, ReplicaMapper};
use crate::metadata::TopologyCache;
use crate::partitioner::ReplicaPartitioner;
use crate::rowio::RowWriter;

/// Keys every record by its replica set, shuffles by host, and strips the
/// key again.
pub struct LocalityRepartitioner {
    topology: Arc<TopologyCache>,
}

impl LocalityRepartitioner {
    pub fn new(topology: Arc<TopologyCache>) -> Self {
        Self { topology }
    }

    /// Repartitions `dataset` for the table named by `spec`.
    ///
    /// Every output partition belongs to one host's block and prefers that
    /// host. No record is dropped or duplicated; if any record cannot be
    /// mapped, the whole call fails.
    pub async fn repartition<T>(
        &self,
        dataset: PartitionedDataset<T>,
        spec: &JoinSpec,
        writer: Arc<dyn RowWriter<T>>,
        partitions_per_host: usize,
    ) -> Result<PartitionedDataset<T>>
    where
        T: Send + 'static,
    {
        if partitions_per_host == 0 {
            return Err(Error::Configuration(
                "partitions_per_host must be at least 1".into(),
            ));
        }
        let metadata = self.topology.metadata().await?;
        spec.resolve(&metadata)?;
        let mapper = ReplicaMapper::for_row_writer(&metadata, &spec.keyspace, &spec.table, writer)?;
        let partitioner = ReplicaPartitioner::new(metadata.ring(), partitions_per_host)?;

        tokio::task::spawn_blocking(move || repartition_with(dataset, &mapper, &partitioner))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }
}

/// Synchronous core of [`LocalityRepartitioner::repartition`]: keys input
/// partitions in parallel, then shuffles.
///
/// Keying uses at most one thread per available core; input partitions are
/// split into contiguous groups, one per thread.
pub fn repartition_with<T: Send>(
    dataset: PartitionedDataset<T>,
    mapper: &ReplicaMapper<T>,
    partitioner: &ReplicaPartitioner,
) -> Result<PartitionedDataset<T>> {
    let input_partitions = dataset.num_partitions();
    let records = dataset.len();
    let threads = keying_threads().min(input_partitions).max(1);
    let per_thread = input_partitions.div_ceil(threads).max(1);

    let mut groups: Vec<Vec<Vec<T>>> = Vec::with_capacity(threads);
    let mut partitions = dataset.into_partitions().into_iter().peekable();
    while partitions.peek().is_some() {
        groups.push(
            partitions
                .by_ref()
                .take(per_thread)
                .map(|partition| partition.records)
                .collect(),
        );
    }

    let keyed: Vec<Result<Vec<(ReplicaKey, T)>>> = crossbeam::scope(|scope| {
        let handles: Vec<_> = groups
            .into_iter()
            .map(|group| {
                scope.spawn(move |_| -> Result<Vec<(ReplicaKey, T)>> {
                    let mut keyed = Vec::new();
                    for records in group {
                        keyed.extend(mapper.route_all(records)?);
                    }
                    Ok(keyed)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::Task("keying thread panicked".into())))
            })
            .collect()
    })
    .map_err(|_| Error::Task("keying scope panicked".into()))?;
    let keyed = keyed.into_iter().collect::<Result<Vec<_>>>()?;

    let output = PartitionedDataset::shuffle(keyed, partitioner);

    let fallback = partitioner.fallback_count();
    if fallback > 0 {
        warn!(
            keyspace = mapper.keyspace(),
            table = mapper.table(),
            fallback,
            "records routed to the fallback partition; topology may be incomplete"
        );
    }
    debug!(
        keyspace = mapper.keyspace(),
        table = mapper.table(),
        records,
        input_partitions,
        threads,
        output_partitions = output.num_partitions(),
        "repartitioned by replica"
    );
    Ok(output)
}

/// Upper bound on keying threads.
pub fn keying_threads() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
