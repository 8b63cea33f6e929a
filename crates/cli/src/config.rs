//! Command-line configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use connector::{
    ClusterMetadata, ConnectorConfig, StaticTopologyClient, TopologyCache, TopologySnapshot,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, CommandResult};

#[derive(Parser, Debug)]
#[command(name = "ringctl", author, version, about, long_about = None)]
pub struct CliConfig {
    /// Topology snapshot (JSON) to inspect.
    #[arg(long, short = 't', global = true, default_value = "topology.json")]
    pub topology: PathBuf,

    /// Connector configuration (JSON); defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `connector=debug`.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn load_snapshot(&self) -> anyhow::Result<TopologySnapshot> {
        let json = std::fs::read_to_string(&self.topology)
            .with_context(|| format!("reading topology {}", self.topology.display()))?;
        let snapshot: TopologySnapshot = serde_json::from_str(&json)
            .with_context(|| format!("parsing topology {}", self.topology.display()))?;
        debug!(version = snapshot.version, nodes = snapshot.nodes.len(), "loaded topology");
        Ok(snapshot)
    }

    /// Snapshot file served through a topology cache, as a connector job
    /// would see it.
    pub async fn load_metadata(&self, config: &ConnectorConfig) -> anyhow::Result<Arc<ClusterMetadata>> {
        let client = Arc::new(StaticTopologyClient::new(self.load_snapshot()?));
        let cache = TopologyCache::new(client, config.topology_retry);
        Ok(cache.metadata().await?)
    }

    pub fn load_connector_config(&self) -> anyhow::Result<ConnectorConfig> {
        match &self.config {
            Some(path) => Ok(ConnectorConfig::from_file(path)?),
            None => Ok(ConnectorConfig::default()),
        }
    }

    pub async fn run(&self) -> anyhow::Result<CommandResult> {
        let config = self.load_connector_config()?;
        let metadata = self.load_metadata(&config).await?;
        self.command.execute(&metadata, &config)
    }
}
