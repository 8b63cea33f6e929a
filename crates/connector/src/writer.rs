//! Bulk write boundary: feeds a partitioned dataset to a table writer in
//! batches.
//!
//! Retries are the [`TableWriter`]'s business; a failed batch fails the
//! whole write.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use replication::ConsistencyLevel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::PartitionedDataset;
use crate::error::{Error, Result, StoreError};
use crate::metadata::ClusterMetadata;
use crate::rowio::{bind_columns, check_writer_covers, Row, RowWriter};
use crate::schema::{ColumnDef, TableDef};

pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_WRITE_PARALLELISM: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    pub consistency_level: ConsistencyLevel,
    /// Rows per batch handed to the table writer.
    pub batch_size: usize,
    /// Partitions written concurrently.
    pub parallelism: usize,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            consistency_level: ConsistencyLevel::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: DEFAULT_WRITE_PARALLELISM,
        }
    }
}

impl WriteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration("write.batch_size must be at least 1".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::Configuration("write.parallelism must be at least 1".into()));
        }
        Ok(())
    }
}

/// Sink for batches of rows, typically a driver session issuing unlogged
/// batches.
#[async_trait]
pub trait TableWriter: Send + Sync {
    async fn write_batch(
        &self,
        table: &TableDef,
        columns: &[String],
        rows: Vec<Row>,
        config: &WriteConfig,
    ) -> std::result::Result<(), StoreError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub batches: usize,
}

impl std::ops::Add for WriteSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            rows_written: self.rows_written + other.rows_written,
            batches: self.batches + other.batches,
        }
    }
}

/// Writes every record of `dataset` into `keyspace.table`.
///
/// Columns come from `writer`; every key column must be among them. Records
/// are converted partition by partition, so a bad record fails before its
/// partition sends anything.
pub async fn write_dataset<T>(
    metadata: &ClusterMetadata,
    keyspace: &str,
    table: &str,
    dataset: PartitionedDataset<T>,
    writer: Arc<dyn RowWriter<T>>,
    sink: Arc<dyn TableWriter>,
    config: &WriteConfig,
) -> Result<WriteSummary> {
    config.validate()?;
    let table = metadata.table(keyspace, table)?;
    let replication_factor = metadata.keyspace(keyspace)?.replication.replication_factor();
    if !config.consistency_level.is_achievable(replication_factor) {
        return Err(Error::Configuration(format!(
            "consistency level {} needs more than {replication_factor} replica(s) of {keyspace}",
            config.consistency_level
        )));
    }

    let columns = write_columns(writer.as_ref(), &table)?;
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let summary = stream::iter(dataset.into_partitions())
        .map(|partition| {
            let (table, columns, names) = (&table, &columns, &names);
            let (writer, sink) = (writer.as_ref(), sink.as_ref());
            async move {
                let rows = partition
                    .records
                    .iter()
                    .map(|record| to_row(writer, record, table, columns))
                    .collect::<Result<Vec<_>>>()?;
                let mut summary = WriteSummary::default();
                let mut rows = rows.into_iter().peekable();
                while rows.peek().is_some() {
                    let batch: Vec<Row> = rows.by_ref().take(config.batch_size).collect();
                    let len = batch.len();
                    sink.write_batch(table, names, batch, config)
                        .await
                        .map_err(|e| Error::WriteFailed {
                            keyspace: table.keyspace.clone(),
                            table: table.name.clone(),
                            reason: e.to_string(),
                        })?;
                    summary.rows_written += len;
                    summary.batches += 1;
                }
                debug!(partition = partition.index, rows = summary.rows_written, "partition written");
                Ok::<_, Error>(summary)
            }
        })
        .buffer_unordered(config.parallelism)
        .try_fold(WriteSummary::default(), |total, part| async move { Ok(total + part) })
        .await?;

    info!(
        table = %table.qualified_name(),
        rows = summary.rows_written,
        batches = summary.batches,
        consistency = %config.consistency_level,
        "dataset written"
    );
    Ok(summary)
}

/// Table columns the writer provides, in table order.
fn write_columns<T>(writer: &dyn RowWriter<T>, table: &TableDef) -> Result<Vec<ColumnDef>> {
    let keys: Vec<ColumnDef> = table
        .partition_key
        .iter()
        .chain(&table.clustering_columns)
        .cloned()
        .collect();
    check_writer_covers(writer, table, &keys)?;
    if let Some(unknown) = writer
        .column_names()
        .iter()
        .find(|name| table.column(name).is_none())
    {
        return Err(Error::schema(
            &table.keyspace,
            &table.name,
            unknown,
            "column does not exist in the table",
        ));
    }
    Ok(table
        .columns()
        .filter(|c| writer.column_names().contains(&c.name))
        .cloned()
        .collect())
}

/// Key columns must be present and non-null; regular columns may be null.
fn to_row<T>(
    writer: &dyn RowWriter<T>,
    record: &T,
    table: &TableDef,
    columns: &[ColumnDef],
) -> Result<Row> {
    let (keys, regular): (Vec<ColumnDef>, Vec<ColumnDef>) = columns
        .iter()
        .cloned()
        .partition(|c| table.regular_columns.iter().all(|r| r.name != c.name));
    let key_values = bind_columns(writer, record, table, &keys)?;

    let mut row: Row = keys
        .into_iter()
        .map(|c| c.name)
        .zip(key_values)
        .collect();
    for column in regular {
        let value = writer.column_value(record, &column.name).ok_or_else(|| {
            Error::schema(&table.keyspace, &table.name, &column.name, "record has no such field")
        })?;
        match value.column_type() {
            Some(actual) if actual != column.column_type => {
                return Err(Error::schema(
                    &table.keyspace,
                    &table.name,
                    &column.name,
                    format!("expected {}, found {}", column.column_type, actual),
                ))
            }
            _ => row = row.with(column.name, value),
        }
    }
    Ok(row)
}
