//! Capability interfaces between caller record types and store rows.
//!
//! Callers implement [`RowWriter`] to expose a record's columns and
//! [`RowReader`] to build a result from a fetched [`Row`]. Partition keys are
//! derived through [`PartitionKeyExtractor`], which [`RowWriterKeyExtractor`]
//! implements on top of any `RowWriter`.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{check_key_component, routing_key, ColumnDef, TableDef};
use crate::value::ColumnValue;

/// A row returned by the store: named column values in selection order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, ColumnValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(String, ColumnValue)] {
        &self.columns
    }

    /// Keeps only the named columns, in the given order; absent ones are null.
    pub fn project(&self, columns: &[String]) -> Row {
        Row {
            columns: columns
                .iter()
                .map(|c| (c.clone(), self.get(c).cloned().unwrap_or(ColumnValue::Null)))
                .collect(),
        }
    }
}

impl FromIterator<(String, ColumnValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, ColumnValue)>>(iter: I) -> Self {
        Row {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Exposes the columns of a caller record.
pub trait RowWriter<T>: Send + Sync {
    /// Table column names this writer can produce.
    fn column_names(&self) -> &[String];

    /// Value of `column` for `record`. `None` means the record has no such
    /// column, which is different from a `ColumnValue::Null`.
    fn column_value(&self, record: &T, column: &str) -> Option<ColumnValue>;
}

/// Builds a caller result from a store row.
pub trait RowReader<R>: Send + Sync {
    fn read(&self, row: &Row) -> Result<R>;
}

impl<R, F> RowReader<R> for F
where
    F: Fn(&Row) -> Result<R> + Send + Sync,
{
    fn read(&self, row: &Row) -> Result<R> {
        self(row)
    }
}

/// Pure, deterministic mapping from a record to its serialized partition key.
pub trait PartitionKeyExtractor<T>: Send + Sync {
    fn partition_key(&self, record: &T) -> Result<Vec<u8>>;
}

/// Reads `columns` of `record` through `writer`, checking presence, type and
/// serialized size.
pub(crate) fn bind_columns<T>(
    writer: &dyn RowWriter<T>,
    record: &T,
    table: &TableDef,
    columns: &[ColumnDef],
) -> Result<Vec<ColumnValue>> {
    columns
        .iter()
        .map(|column| {
            let value = writer.column_value(record, &column.name).ok_or_else(|| {
                Error::schema(&table.keyspace, &table.name, &column.name, "record has no such field")
            })?;
            match value.column_type() {
                None => Err(Error::schema(
                    &table.keyspace,
                    &table.name,
                    &column.name,
                    "null value in key column",
                )),
                Some(actual) if actual != column.column_type => Err(Error::schema(
                    &table.keyspace,
                    &table.name,
                    &column.name,
                    format!("expected {}, found {}", column.column_type, actual),
                )),
                Some(_) => {
                    if let Some(bytes) = value.serialize() {
                        check_key_component(&bytes).map_err(|reason| {
                            Error::schema(&table.keyspace, &table.name, &column.name, reason)
                        })?;
                    }
                    Ok(value)
                }
            }
        })
        .collect()
}

/// Serialized key bytes for bound, non-null values.
pub(crate) fn encode_key(values: &[ColumnValue]) -> Vec<u8> {
    let components: Vec<Vec<u8>> = values.iter().filter_map(ColumnValue::serialize).collect();
    routing_key(&components)
}

/// Checks up front that `writer` can supply every column in `columns`.
pub(crate) fn check_writer_covers<T>(
    writer: &dyn RowWriter<T>,
    table: &TableDef,
    columns: &[ColumnDef],
) -> Result<()> {
    let available = writer.column_names();
    match columns.iter().find(|c| !available.contains(&c.name)) {
        Some(missing) => Err(Error::schema(
            &table.keyspace,
            &table.name,
            &missing.name,
            "row writer does not provide this column",
        )),
        None => Ok(()),
    }
}

/// Partition-key extraction through a [`RowWriter`].
pub struct RowWriterKeyExtractor<T> {
    writer: Arc<dyn RowWriter<T>>,
    table: Arc<TableDef>,
}

impl<T> RowWriterKeyExtractor<T> {
    /// Fails with `SchemaMismatch` if the writer lacks a partition-key column.
    pub fn new(writer: Arc<dyn RowWriter<T>>, table: Arc<TableDef>) -> Result<Self> {
        check_writer_covers(writer.as_ref(), &table, &table.partition_key)?;
        Ok(Self { writer, table })
    }
}

impl<T> PartitionKeyExtractor<T> for RowWriterKeyExtractor<T> {
    fn partition_key(&self, record: &T) -> Result<Vec<u8>> {
        let values = bind_columns(
            self.writer.as_ref(),
            record,
            &self.table,
            &self.table.partition_key,
        )?;
        Ok(encode_key(&values))
    }
}
