mod api;
mod config;
mod envelope;
mod pulls;
mod resolve;
mod server;
mod snapshot;
mod tree;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bitbucket MCP server: serves Bitbucket Cloud repositories, branches, pull
/// requests and file trees as MCP tools over stdio.
#[derive(Parser, Debug)]
#[command(name = "bitbucket-mcp", version, about)]
struct Cli {
    /// Config file path (defaults to .bitbucket-mcp.toml in the cwd)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP transport; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => config::Config::load_from(&path)?,
        None => config::Config::load()?,
    };
    info!(api_base = %config.api_base(), "starting bitbucket-mcp");

    let client = api::BitbucketClient::new(&config);
    server::BitbucketMcp::new(client).serve_stdio().await?;

    info!("bitbucket-mcp stopped");
    Ok(())
}
