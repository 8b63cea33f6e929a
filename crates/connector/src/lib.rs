//! Replica-aware placement and locality joins for a token-ring store.
//!
//! The [`repartition::LocalityRepartitioner`] reshapes a dataset so that every
//! partition holds records owned by one host, and the
//! [`join::SinglePartitionJoinExecutor`] joins records against a table with
//! one single-partition read per distinct key.

pub mod config;
pub mod dataset;
pub mod error;
pub mod join;
pub mod mapper;
pub mod metadata;
pub mod partitioner;
pub mod repartition;
pub mod retry;
pub mod rowio;
pub mod schema;
pub mod session;
pub mod value;
pub mod writer;

pub use config::ConnectorConfig;
pub use dataset::{Partition, PartitionedDataset, ShufflePartitioner};
pub use error::{Error, Result, StoreError};
pub use join::{JoinMode, JoinSpec, ResolvedJoin, SinglePartitionJoinExecutor};
pub use mapper::{ReplicaKey, ReplicaMapper};
pub use metadata::{
    ClusterMetadata, ClusterRegistry, NodeDescriptor, StaticTopologyClient, TokenRingClient,
    TopologyCache, TopologySnapshot,
};
pub use partitioner::{HostPartitionAssignment, ReplicaPartitioner, FALLBACK_PARTITION};
pub use repartition::LocalityRepartitioner;
pub use retry::RetryPolicy;
pub use rowio::{PartitionKeyExtractor, Row, RowReader, RowWriter, RowWriterKeyExtractor};
pub use schema::{ColumnDef, KeyspaceDef, TableDef};
pub use session::{SinglePartitionQuery, StoreSession};
pub use value::{ColumnType, ColumnValue};
pub use writer::{write_dataset, TableWriter, WriteConfig, WriteSummary};
