//! Table and keyspace definitions, and partition-key encoding.

use replication::ReplicationConfig;
use serde::{Deserialize, Serialize};

use crate::value::ColumnType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Owning keyspace; filled in from the enclosing keyspace when loaded
    /// from a topology snapshot.
    #[serde(default)]
    pub keyspace: String,
    pub name: String,
    pub partition_key: Vec<ColumnDef>,
    #[serde(default)]
    pub clustering_columns: Vec<ColumnDef>,
    #[serde(default)]
    pub regular_columns: Vec<ColumnDef>,
}

impl TableDef {
    /// All columns in key order: partition key, clustering, regular.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> + '_ {
        self.partition_key
            .iter()
            .chain(&self.clustering_columns)
            .chain(&self.regular_columns)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns().find(|c| c.name == name)
    }

    pub fn is_partition_key(&self, name: &str) -> bool {
        self.partition_key.iter().any(|c| c.name == name)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceDef {
    pub name: String,
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub tables: Vec<TableDef>,
}

/// Largest serialized key component the store accepts.
pub const MAX_KEY_COMPONENT_LEN: usize = u16::MAX as usize;

/// Builds the routing key from serialized partition-key components.
///
/// A single component is used as is. Composite keys encode every component
/// as a big-endian `u16` length, the bytes, and a zero end-of-component byte.
/// Components must not exceed [`MAX_KEY_COMPONENT_LEN`]; use
/// [`check_key_component`] first.
pub fn routing_key(components: &[Vec<u8>]) -> Vec<u8> {
    if let [single] = components {
        return single.clone();
    }
    let size = components.iter().map(|c| c.len() + 3).sum();
    let mut key = Vec::with_capacity(size);
    for component in components {
        key.extend_from_slice(&(component.len() as u16).to_be_bytes());
        key.extend_from_slice(component);
        key.push(0);
    }
    key
}

/// Rejects a serialized key component the composite encoding cannot carry.
pub fn check_key_component(component: &[u8]) -> Result<(), String> {
    if component.len() > MAX_KEY_COMPONENT_LEN {
        return Err(format!(
            "key component is {} bytes, at most {MAX_KEY_COMPONENT_LEN} allowed",
            component.len()
        ));
    }
    Ok(())
}
