mod hub;
mod routes;
mod state;
mod tick_loop;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use conquest_world::load_content;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::routes::make_router_with_cors;
use crate::state::AppState;
use crate::tick_loop::{run_tick_loop, IntervalTickSource};

#[derive(Parser)]
#[command(name = "conquest_daemon", about = "Hosts one territory-conquest match over HTTP")]
struct Cli {
    #[arg(long, default_value = "./content")]
    content_dir: String,
    /// Match seed. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Roster size `POST /api/v1/start` fills to with bots.
    #[arg(long, default_value_t = 8)]
    bots: usize,
    /// Override the tick rate from constants.json.
    #[arg(long)]
    ticks_per_sec: Option<f64>,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Stop ticking after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let content = load_content(&cli.content_dir)
        .with_context(|| format!("loading content from {}", cli.content_dir))?;
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut app_state = AppState::new(Arc::new(content), seed, cli.bots);
    if let Some(ticks_per_sec) = cli.ticks_per_sec {
        app_state.ticks_per_sec = ticks_per_sec;
    }
    info!(seed, ticks_per_sec = app_state.ticks_per_sec, "match created");

    let loop_state = app_state.clone();
    let source = IntervalTickSource::new(app_state.ticks_per_sec);
    let max_ticks = cli.max_ticks;
    tokio::spawn(async move {
        run_tick_loop(loop_state, source, max_ticks).await;
    });

    let router = make_router_with_cors(app_state, &cli.cors_origin)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(())
}
