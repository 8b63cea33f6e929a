//! Single-partition reads against the store.

use std::fmt;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::rowio::Row;
use crate::value::ColumnValue;

/// A read restricted to one logical partition of one table.
///
/// `restrictions` always binds every partition-key column, optionally
/// followed by a prefix of the clustering columns, so the store can serve it
/// without scanning.
#[derive(Clone, Debug, PartialEq)]
pub struct SinglePartitionQuery {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<String>,
    pub restrictions: Vec<(String, ColumnValue)>,
}

impl SinglePartitionQuery {
    /// Statement text with bind markers.
    pub fn statement(&self) -> String {
        let predicates: Vec<String> = self
            .restrictions
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect();
        format!(
            "SELECT {} FROM {}.{} WHERE {}",
            self.columns.join(", "),
            self.keyspace,
            self.table,
            predicates.join(" AND ")
        )
    }

    pub fn bound_values(&self) -> impl Iterator<Item = &ColumnValue> + '_ {
        self.restrictions.iter().map(|(_, value)| value)
    }
}

impl fmt::Display for SinglePartitionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.bound_values().map(|v| v.to_string()).collect();
        write!(f, "{} [{}]", self.statement(), values.join(", "))
    }
}

/// Driver session able to run single-partition reads.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Rows of the addressed partition; an empty vector if none match.
    async fn fetch_partition(&self, query: &SinglePartitionQuery) -> Result<Vec<Row>, StoreError>;
}
