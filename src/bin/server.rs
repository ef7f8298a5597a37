//! Memori MCP server - exposes `store_memory` and `search_memory` over HTTP.

use clap::Parser;
use memori::config::{Config, LogConfig};
use memori::MemoryEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memori-server", version, about = "Memori MCP memory server")]
struct Args {
    /// Config file (TOML or JSON5)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Port
    #[arg(long, short)]
    port: Option<u16>,
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.log);

    let engine = MemoryEngine::from_config(&config.search).await?;
    engine.enable();
    info!("Memory backend: {}", engine.backend());

    let app = memori::mcp::router(Arc::new(engine));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    info!("Memori MCP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
