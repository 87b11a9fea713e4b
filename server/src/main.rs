//! Figma sync server
//! - Watches the Rhino JSON export
//! - Serves the Figma-ready scene over HTTP
//! - Pushes freshly processed scenes over WebSocket

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

mod artifact;
mod config;
mod remote;
mod routes;
mod trigger;

use config::Args;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let figma = args.figma();
    match &figma {
        Some(figma) => info!("Figma diagnostics enabled for file {}", figma.file_key),
        None => info!("Figma diagnostics disabled (set FIGMA_TOKEN and FIGMA_FILE_KEY)"),
    }

    artifact::ensure_exists(&args.file)?;
    info!("Watching: {:?}", args.file);

    let state = Arc::new(AppState::new(args.file.clone()));
    let (write_tx, write_rx) = mpsc::channel(64);

    // Initial load goes through the trigger like any other write
    write_tx.send(tokio::time::Instant::now()).await?;

    tokio::spawn(trigger::run(
        write_rx,
        args.stability_window(),
        state.clone(),
        figma,
    ));

    let watch_path = args.file.clone();
    let poll = args.poll_interval();
    tokio::spawn(async move {
        if let Err(e) = trigger::watch_file(watch_path, poll, write_tx).await {
            error!("File watcher stopped: {:#}", e);
        }
    });

    let app = routes::router(state);

    let addr = args.addr();
    info!("Server: http://{}", addr);
    info!("Pull endpoint: http://{}/figma-ready.json", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
