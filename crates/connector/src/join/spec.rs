//! What a join reads: target table, selected columns and join columns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::ClusterMetadata;
use crate::schema::{ColumnDef, TableDef};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Only records with at least one matching row.
    #[default]
    Inner,
    /// Every record; unmatched ones appear once with no row.
    LeftOuter,
}

/// Target of a join. Immutable once the join is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub keyspace: String,
    pub table: String,
    /// Columns to fetch; empty means every column of the table.
    #[serde(default)]
    pub selected_columns: Vec<String>,
    /// Columns to join on; `None` means the full partition key.
    #[serde(default)]
    pub join_columns: Option<Vec<String>>,
}

impl JoinSpec {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            selected_columns: Vec::new(),
            join_columns: None,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Checks the spec against the cluster schema.
    ///
    /// Join columns must cover the whole partition key and may add a prefix
    /// of the clustering columns, so each lookup stays inside one partition.
    pub fn resolve(&self, metadata: &ClusterMetadata) -> Result<ResolvedJoin> {
        let table = metadata.table(&self.keyspace, &self.table)?;
        let qualified = table.qualified_name();

        let join_columns = match &self.join_columns {
            None => table.partition_key.clone(),
            Some(names) => {
                if names.is_empty() {
                    return Err(Error::Configuration(format!(
                        "join on {qualified} names no columns"
                    )));
                }
                let mut columns = Vec::with_capacity(names.len());
                for name in names {
                    let column = table.column(name).ok_or_else(|| {
                        Error::Configuration(format!("column `{name}` does not exist in {qualified}"))
                    })?;
                    if columns.iter().any(|c: &ColumnDef| c.name == *name) {
                        return Err(Error::Configuration(format!(
                            "join column `{name}` listed twice for {qualified}"
                        )));
                    }
                    columns.push(column.clone());
                }
                order_join_columns(&table, columns)?
            }
        };

        let selected_columns = if self.selected_columns.is_empty() {
            table.columns().map(|c| c.name.clone()).collect()
        } else {
            for name in &self.selected_columns {
                if table.column(name).is_none() {
                    return Err(Error::Configuration(format!(
                        "selected column `{name}` does not exist in {qualified}"
                    )));
                }
            }
            self.selected_columns.clone()
        };

        Ok(ResolvedJoin {
            table,
            join_columns,
            selected_columns,
        })
    }
}

/// Puts join columns in key order and checks they address one partition.
fn order_join_columns(table: &TableDef, columns: Vec<ColumnDef>) -> Result<Vec<ColumnDef>> {
    let qualified = table.qualified_name();
    let named = |c: &ColumnDef| columns.iter().any(|j| j.name == c.name);

    if let Some(missing) = table.partition_key.iter().find(|c| !named(c)) {
        return Err(Error::Configuration(format!(
            "join on {qualified} must include partition key column `{}`",
            missing.name
        )));
    }
    if let Some(regular) = table.regular_columns.iter().find(|c| named(c)) {
        return Err(Error::Configuration(format!(
            "join on {qualified} cannot use regular column `{}`",
            regular.name
        )));
    }
    let prefix = table
        .clustering_columns
        .iter()
        .take_while(|c| named(c))
        .count();
    if let Some(gap) = table.clustering_columns[prefix..].iter().find(|c| named(c)) {
        return Err(Error::Configuration(format!(
            "join on {qualified} uses clustering column `{}` without the ones before it",
            gap.name
        )));
    }

    Ok(table
        .partition_key
        .iter()
        .chain(&table.clustering_columns[..prefix])
        .cloned()
        .collect())
}

/// A join spec validated against one topology snapshot.
#[derive(Clone, Debug)]
pub struct ResolvedJoin {
    pub table: Arc<TableDef>,
    /// Partition key first, then any clustering prefix.
    pub join_columns: Vec<ColumnDef>,
    pub selected_columns: Vec<String>,
}
