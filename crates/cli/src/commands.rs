//! Subcommands. Each renders its report as text so it can be tested without
//! a terminal.

use std::fmt;

use anyhow::{bail, Context};
use clap::Subcommand;
use connector::schema::{check_key_component, routing_key};
use connector::{ClusterMetadata, ConnectorConfig, HostPartitionAssignment};
use corelib::topology::{ownership, primary_ranges};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List primary token ranges and per-node ownership.
    Ring,

    /// Show the token and replica set of a partition key.
    Replicas {
        #[arg(long, short = 'k')]
        keyspace: String,

        #[arg(long)]
        table: String,

        /// One literal per partition-key column, in key order.
        #[arg(long = "key", required = true, num_args = 1..)]
        key: Vec<String>,
    },

    /// Preview the partition blocks a repartition would assign to each host.
    Plan {
        /// Overrides `partitions_per_host` from the connector config.
        #[arg(long)]
        partitions_per_host: Option<usize>,
    },
}

/// Rendered output of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResult {
    pub lines: Vec<String>,
}

impl CommandResult {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl Command {
    pub fn execute(
        &self,
        metadata: &ClusterMetadata,
        config: &ConnectorConfig,
    ) -> anyhow::Result<CommandResult> {
        match self {
            Command::Ring => Ok(ring(metadata)),
            Command::Replicas {
                keyspace,
                table,
                key,
            } => replicas(metadata, keyspace, table, key),
            Command::Plan {
                partitions_per_host,
            } => plan(
                metadata,
                partitions_per_host.unwrap_or(config.partitions_per_host),
            ),
        }
    }
}

fn ring(metadata: &ClusterMetadata) -> CommandResult {
    let ring = metadata.ring();
    let mut out = CommandResult::default();
    out.push(format!(
        "version {} | {} node(s) | {} token(s) | {}",
        metadata.version(),
        ring.node_count(),
        ring.len(),
        metadata.partitioner().name()
    ));
    for (range, owner) in primary_ranges(ring) {
        out.push(format!("({}, {}] -> {owner}", range.start, range.end));
    }
    for (node, share) in ownership(ring) {
        let location = ring
            .node(&node)
            .map(|n| {
                format!(
                    "{}/{}",
                    n.datacenter.as_deref().unwrap_or("-"),
                    n.rack.as_deref().unwrap_or("-")
                )
            })
            .unwrap_or_default();
        out.push(format!("{node} {location} owns {:.2}%", share * 100.0));
    }
    out
}

fn replicas(
    metadata: &ClusterMetadata,
    keyspace: &str,
    table: &str,
    key: &[String],
) -> anyhow::Result<CommandResult> {
    let table = metadata.table(keyspace, table)?;
    if key.len() != table.partition_key.len() {
        bail!(
            "{} has {} partition key column(s), got {} value(s)",
            table.qualified_name(),
            table.partition_key.len(),
            key.len()
        );
    }
    let mut components = Vec::with_capacity(key.len());
    for (column, literal) in table.partition_key.iter().zip(key) {
        let value = column
            .column_type
            .parse_value(literal)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("column `{}` ({})", column.name, column.column_type))?;
        if let Some(bytes) = value.serialize() {
            check_key_component(&bytes)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("column `{}`", column.name))?;
            components.push(bytes);
        }
    }

    let token = metadata.partitioner().token(&routing_key(&components));
    let placement = metadata.placement(keyspace)?;
    let replicas = placement.replicas_for_token(token);

    let mut out = CommandResult::default();
    out.push(format!("token {token}"));
    out.push(format!(
        "replicas {replicas} (rf {})",
        placement.replication_factor()
    ));
    if let Some(primary) = metadata.ring().primary_owner(token) {
        out.push(format!("primary {primary}"));
    }
    Ok(out)
}

fn plan(metadata: &ClusterMetadata, partitions_per_host: usize) -> anyhow::Result<CommandResult> {
    let assignment =
        HostPartitionAssignment::new(metadata.ring().addresses().iter().copied(), partitions_per_host)?;
    let mut out = CommandResult::default();
    out.push(format!(
        "{} partition(s), {} per host",
        assignment.num_partitions(),
        assignment.partitions_per_host()
    ));
    for host in assignment.hosts() {
        if let Some(block) = assignment.block(host) {
            out.push(format!("{host} -> {}..{}", block.start, block.end));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector::TopologySnapshot;

    fn metadata() -> ClusterMetadata {
        let snapshot: TopologySnapshot = serde_json::from_str(
            r#"{
                "version": 7,
                "nodes": [
                    {"address": "10.0.0.1", "datacenter": "dc1", "rack": "r1", "tokens": [-4611686018427387904]},
                    {"address": "10.0.0.2", "datacenter": "dc1", "rack": "r2", "tokens": [0]},
                    {"address": "10.0.0.3", "datacenter": "dc1", "rack": "r3", "tokens": [4611686018427387904]}
                ],
                "keyspaces": [{
                    "name": "ks",
                    "replication": {"class": "SimpleStrategy", "replication_factor": 2},
                    "tables": [{
                        "name": "t",
                        "partition_key": [{"name": "pk", "type": "int"}],
                        "regular_columns": [{"name": "val", "type": "text"}]
                    }]
                }]
            }"#,
        )
        .unwrap();
        ClusterMetadata::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn test_ring_report() {
        let out = ring(&metadata());
        assert_eq!(out.lines[0], "version 7 | 3 node(s) | 3 token(s) | Murmur3Partitioner");
        assert_eq!(out.lines.len(), 1 + 3 + 3);
        assert!(out.lines.iter().any(|l| l == "10.0.0.1 dc1/r1 owns 50.00%"));
        assert!(out.lines.iter().any(|l| l == "10.0.0.2 dc1/r2 owns 25.00%"));
    }

    #[test]
    fn test_replicas_for_int_key() {
        // int 1 hashes to -4069959284402364209, owned by 10.0.0.2.
        let out = replicas(&metadata(), "ks", "t", &["1".to_string()]).unwrap();
        assert_eq!(out.lines[0], "token -4069959284402364209");
        assert_eq!(out.lines[1], "replicas {10.0.0.2, 10.0.0.3} (rf 2)");
        assert_eq!(out.lines[2], "primary 10.0.0.2");
    }

    #[test]
    fn test_replicas_rejects_bad_keys() {
        let metadata = metadata();
        assert!(replicas(&metadata, "ks", "t", &["x".to_string()]).is_err());
        assert!(replicas(&metadata, "ks", "t", &[]).is_err());
        assert!(replicas(&metadata, "ks", "missing", &["1".to_string()]).is_err());
    }

    #[test]
    fn test_plan_uses_override() {
        let command = Command::Plan {
            partitions_per_host: Some(2),
        };
        let out = command.execute(&metadata(), &ConnectorConfig::default()).unwrap();
        assert_eq!(
            out.lines,
            vec![
                "6 partition(s), 2 per host",
                "10.0.0.1 -> 0..2",
                "10.0.0.2 -> 2..4",
                "10.0.0.3 -> 4..6",
            ]
        );
    }
}
