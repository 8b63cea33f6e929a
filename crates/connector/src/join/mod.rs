//! Per-key joins against the store that never scan a table.

pub mod executor;
pub mod spec;

pub use executor::SinglePartitionJoinExecutor;
pub use spec::{JoinMode, JoinSpec, ResolvedJoin};
