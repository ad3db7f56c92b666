use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod clients;
mod config;
mod error;
mod handlers;
mod logic;
mod oplog;
mod palette;
mod registry;
mod room;
mod state;

use crate::config::{
    ServerConfig, DEFAULT_MAX_CHAT_LEN, DEFAULT_MAX_LOG_ENTRIES, DEFAULT_MAX_POINTS,
};
use crate::handlers::app_router;
use crate::palette::{default_palette, parse_palette};
use crate::state::AppState;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: IpAddr,
    #[arg(long)]
    public_dir: Option<PathBuf>,
    /// Comma separated colors handed out to clients as they join
    #[arg(long)]
    palette: Option<String>,
    #[arg(long, default_value_t = DEFAULT_MAX_POINTS)]
    max_points: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_LOG_ENTRIES)]
    max_log_entries: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_CHAT_LEN)]
    max_chat_len: usize,
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = Arc::new(ServerConfig {
        palette: args
            .palette
            .as_deref()
            .map(parse_palette)
            .unwrap_or_else(default_palette),
        max_points: args.max_points,
        max_log_entries: args.max_log_entries,
        max_chat_len: args.max_chat_len,
    });
    let state = AppState::new(config);

    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let app = app_router(state, public_dir);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "doodly server listening");
    axum::serve(listener, app).await.context("server crashed")?;
    Ok(())
}
