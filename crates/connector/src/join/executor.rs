//! Per-key joins executed as single-partition reads.
//!
//! Each local partition is joined by one async task. Within a task, every
//! distinct join key turns into exactly one request: records whose key is
//! already in flight wait for that request, and recently fetched keys are
//! answered from a bounded LRU cache.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use lru::LruCache;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::spec::{JoinMode, JoinSpec, ResolvedJoin};
use crate::config::ConnectorConfig;
use crate::dataset::{Partition, PartitionedDataset};
use crate::error::{Error, Result, StoreError};
use crate::metadata::ClusterMetadata;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::rowio::{bind_columns, check_writer_covers, encode_key, Row, RowReader, RowWriter};
use crate::session::{SinglePartitionQuery, StoreSession};
use crate::value::ColumnValue;

type FetchedRows = Arc<[Row]>;

pub struct SinglePartitionJoinExecutor<L, R> {
    join: ResolvedJoin,
    writer: Arc<dyn RowWriter<L>>,
    reader: Arc<dyn RowReader<R>>,
    session: Arc<dyn StoreSession>,
    max_concurrent_requests: usize,
    fetch_cache_capacity: usize,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl<L, R> SinglePartitionJoinExecutor<L, R> {
    /// Resolves `spec` against `metadata` and checks that `writer` supplies
    /// every join column. Nothing is sent to the store here.
    pub fn new(
        metadata: &ClusterMetadata,
        spec: &JoinSpec,
        writer: Arc<dyn RowWriter<L>>,
        reader: Arc<dyn RowReader<R>>,
        session: Arc<dyn StoreSession>,
        config: &ConnectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let join = spec.resolve(metadata)?;
        check_writer_covers(writer.as_ref(), &join.table, &join.join_columns)?;
        Ok(Self {
            join,
            writer,
            reader,
            session,
            max_concurrent_requests: config.max_concurrent_requests,
            fetch_cache_capacity: config.fetch_cache_capacity,
            request_timeout: config.request_timeout,
            retry: config.retry,
        })
    }

    pub fn resolved(&self) -> &ResolvedJoin {
        &self.join
    }

    /// Joins one local partition.
    ///
    /// Output follows input order. A record matching several rows appears
    /// once per row; an unmatched record appears once with `None` under
    /// [`JoinMode::LeftOuter`] and not at all under [`JoinMode::Inner`].
    pub async fn execute_partition(
        &self,
        records: Vec<L>,
        mode: JoinMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<(L, Option<R>)>>
    where
        L: Clone,
    {
        let mut cache: Option<LruCache<Vec<u8>, FetchedRows>> =
            NonZeroUsize::new(self.fetch_cache_capacity).map(LruCache::new);
        let mut slots: Vec<Option<FetchedRows>> = vec![None; records.len()];
        let mut waiting: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
        let mut in_flight = FuturesUnordered::new();
        let mut requests = 0usize;

        // Bind every key before the first request so a bad record fails the
        // partition without touching the store.
        let keys = records
            .iter()
            .map(|record| {
                let values = bind_columns(
                    self.writer.as_ref(),
                    record,
                    &self.join.table,
                    &self.join.join_columns,
                )?;
                let key = encode_key(&values);
                Ok((values, key))
            })
            .collect::<Result<Vec<_>>>()?;

        for (index, (values, key)) in keys.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(rows) = cache.as_mut().and_then(|c| c.get(&key)) {
                metrics::counter!("join_fetch_cache_hits_total").increment(1);
                slots[index] = Some(rows.clone());
                continue;
            }
            if let Some(waiters) = waiting.get_mut(&key) {
                waiters.push(index);
                continue;
            }

            while in_flight.len() >= self.max_concurrent_requests {
                let done = next_fetch(&mut in_flight, cancel).await?;
                complete(done, &mut waiting, &mut cache, &mut slots)?;
            }
            waiting.insert(key.clone(), vec![index]);
            requests += 1;
            in_flight.push(async move {
                let rows = self.fetch(values).await;
                (key, rows)
            });
        }
        while !in_flight.is_empty() {
            let done = next_fetch(&mut in_flight, cancel).await?;
            complete(done, &mut waiting, &mut cache, &mut slots)?;
        }

        debug!(
            table = %self.join.table.qualified_name(),
            records = records.len(),
            requests,
            "joined partition"
        );

        let mut output = Vec::with_capacity(records.len());
        for (record, rows) in records.into_iter().zip(slots) {
            let rows = rows.ok_or_else(|| Error::Task("join key left without a result".into()))?;
            if rows.is_empty() {
                if mode == JoinMode::LeftOuter {
                    output.push((record, None));
                }
                continue;
            }
            for row in rows.iter() {
                output.push((record.clone(), Some(self.reader.read(row)?)));
            }
        }
        Ok(output)
    }

    /// One single-partition read with per-attempt timeout and retries.
    async fn fetch(&self, values: Vec<ColumnValue>) -> Result<FetchedRows> {
        let query = SinglePartitionQuery {
            keyspace: self.join.table.keyspace.clone(),
            table: self.join.table.name.clone(),
            columns: self.join.selected_columns.clone(),
            restrictions: self
                .join
                .join_columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect(),
        };
        let query = &query;
        let session = self.session.as_ref();
        let timeout = self.request_timeout;

        let result = retry_with_backoff(
            &self.retry,
            "fetch_partition",
            StoreError::is_retryable,
            move |_| {
                metrics::counter!("join_store_requests_total").increment(1);
                async move {
                    match tokio::time::timeout(timeout, session.fetch_partition(query)).await {
                        Ok(result) => result,
                        Err(_) => Err(StoreError::Timeout(timeout)),
                    }
                }
            },
        )
        .await;

        match result {
            Ok(rows) => Ok(rows.into()),
            Err(e) if e.last.is_retryable() => {
                metrics::counter!("join_store_failures_total").increment(1);
                Err(Error::StoreUnavailable {
                    keyspace: query.keyspace.clone(),
                    table: query.table.clone(),
                    key: key_display(query),
                    attempts: e.attempts,
                    reason: e.last.to_string(),
                })
            }
            Err(e) => Err(Error::Configuration(format!(
                "store rejected `{query}`: {}",
                e.last
            ))),
        }
    }
}

impl<L, R> SinglePartitionJoinExecutor<L, R>
where
    L: Clone + Send + 'static,
    R: Send + 'static,
{
    /// Joins every partition of `dataset` concurrently.
    ///
    /// The first failing partition cancels the others and is reported as
    /// [`Error::PartitionFailed`]. Partition indexes and preferred hosts are
    /// kept.
    pub async fn execute(
        self: &Arc<Self>,
        dataset: PartitionedDataset<L>,
        mode: JoinMode,
        cancel: &CancellationToken,
    ) -> Result<PartitionedDataset<(L, Option<R>)>> {
        let job = cancel.child_token();
        let partitions = dataset.into_partitions();
        let mut outputs: Vec<Option<Partition<(L, Option<R>)>>> =
            (0..partitions.len()).map(|_| None).collect();

        let mut tasks = JoinSet::new();
        for (position, partition) in partitions.into_iter().enumerate() {
            let executor = Arc::clone(self);
            let token = job.clone();
            tasks.spawn(async move {
                let Partition {
                    index,
                    preferred_hosts,
                    records,
                } = partition;
                let result = executor.execute_partition(records, mode, &token).await;
                (position, index, preferred_hosts, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (position, index, preferred_hosts, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    job.cancel();
                    return Err(Error::Task(e.to_string()));
                }
            };
            match result {
                Ok(records) => {
                    outputs[position] = Some(Partition {
                        index,
                        preferred_hosts,
                        records,
                    });
                }
                Err(Error::Cancelled) if cancel.is_cancelled() => {
                    job.cancel();
                    return Err(Error::Cancelled);
                }
                Err(err) => {
                    job.cancel();
                    warn!(partition = index, error = %err, "join partition failed, cancelling job");
                    return Err(Error::PartitionFailed {
                        partition: index,
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(PartitionedDataset::from_parts(
            outputs.into_iter().flatten().collect(),
        ))
    }

    /// Records paired with every matching row; unmatched records are dropped.
    pub async fn inner_join(
        self: &Arc<Self>,
        dataset: PartitionedDataset<L>,
        cancel: &CancellationToken,
    ) -> Result<PartitionedDataset<(L, R)>> {
        let joined = self.execute(dataset, JoinMode::Inner, cancel).await?;
        Ok(joined.map_partitions(|_, records| {
            records
                .into_iter()
                .filter_map(|(left, right)| right.map(|right| (left, right)))
                .collect()
        }))
    }

    pub async fn left_outer_join(
        self: &Arc<Self>,
        dataset: PartitionedDataset<L>,
        cancel: &CancellationToken,
    ) -> Result<PartitionedDataset<(L, Option<R>)>> {
        self.execute(dataset, JoinMode::LeftOuter, cancel).await
    }
}

async fn next_fetch<F: Future>(
    in_flight: &mut FuturesUnordered<F>,
    cancel: &CancellationToken,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        Some(done) = in_flight.next() => Ok(done),
    }
}

/// Hands a finished fetch to every record waiting on its key.
fn complete(
    (key, rows): (Vec<u8>, Result<FetchedRows>),
    waiting: &mut HashMap<Vec<u8>, Vec<usize>>,
    cache: &mut Option<LruCache<Vec<u8>, FetchedRows>>,
    slots: &mut [Option<FetchedRows>],
) -> Result<()> {
    let rows = rows?;
    for index in waiting.remove(&key).unwrap_or_default() {
        slots[index] = Some(rows.clone());
    }
    if let Some(cache) = cache {
        cache.put(key, rows);
    }
    Ok(())
}

fn key_display(query: &SinglePartitionQuery) -> String {
    let values: Vec<String> = query.bound_values().map(|v| v.to_string()).collect();
    values.join(", ")
}
