//! CLI entry point for ringctl.

use clap::Parser;
use cli::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    config.init_tracing();
    let result = config.run().await?;
    print!("{result}");
    Ok(())
}
