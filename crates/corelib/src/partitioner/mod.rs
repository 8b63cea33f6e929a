//! Partitioner abstraction for the token ring.
//!
//! Partitioners convert serialized partition keys into tokens. Routing is
//! only correct if the partitioner matches the one the store declares, so
//! lookup by declared name is the normal entry point.

pub mod murmur3;
pub mod traits;

pub use murmur3::Murmur3Partitioner;
pub use traits::Partitioner;

use std::sync::Arc;

use crate::error::{Error, Result};

/// Resolves the partitioner a cluster declares in its metadata.
///
/// Accepts both the short and the fully qualified class name.
pub fn partitioner_for_name(name: &str) -> Result<Arc<dyn Partitioner>> {
    let short = name.rsplit('.').next().unwrap_or(name);
    match short {
        "Murmur3Partitioner" => Ok(Arc::new(Murmur3Partitioner)),
        _ => Err(Error::UnsupportedPartitioner(name.to_string())),
    }
}
