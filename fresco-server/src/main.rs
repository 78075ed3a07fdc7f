use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fresco_core::{load_engine, Orchestrator, Publisher};
use fresco_server::config::{Args, Command};
use fresco_server::{routes, worker};
use tokio::{self, io::BufReader, net::TcpListener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        // stdout carries worker replies
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let engine = load_engine(
        &args.model,
        args.model_cache_dir.as_deref(),
        args.load_options(),
    )
    .await
    .with_context(|| format!("failed to load model {}", args.model))?;

    let publisher = Publisher::from_settings(&args.storage.settings());
    let orchestrator = Arc::new(Orchestrator::new(engine, publisher));
    orchestrator.memory().log_usage("Model loaded");

    match args.command {
        Command::Serve { host, port } => {
            let app = routes::router(orchestrator);

            let bind_address = format!("{host}:{port}");
            let listener = TcpListener::bind(&bind_address)
                .await
                .with_context(|| format!("failed to bind {bind_address}"))?;
            tracing::info!(address = %listener.local_addr()?, "server ready");
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Command::Worker => {
            tracing::info!("worker ready, reading jobs from stdin");
            let stdin = BufReader::new(tokio::io::stdin());
            worker::run(&orchestrator, stdin, tokio::io::stdout()).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
