//! `ringctl`: inspect a store topology snapshot offline.
//!
//! Provides commands for:
//! - Listing token ranges and per-node ownership
//! - Resolving the replicas of a partition key
//! - Previewing the host-affine partition layout of a repartition

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
