//! MCP server (stdio): line-delimited JSON-RPC 2.0 exposing the fsgate tools.

use anyhow::{Context, Result};
use clap::Parser;
use fsgate_cli::mcp::serve;
use fsgate_cli::settings::{init_tracing, ConfigArgs};
use fsgate_gateway::Dispatcher;
use std::sync::Arc;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(name = "fsgate-mcpd", version)]
#[command(about = "MCP server over stdio for sandboxed multi-service file access")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = cli.config.load()?;
    let dispatcher = Dispatcher::from_config(&cfg).context("build dispatcher")?;
    tracing::info!(
        project_root = %dispatcher.gateway().registry().project_root().display(),
        max_concurrency = cfg.limits.max_concurrency,
        rate_limit = cfg.limits.rate_limit,
        "fsgate-mcpd ready"
    );

    serve(
        Arc::new(dispatcher),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("stdio transport")?;
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
