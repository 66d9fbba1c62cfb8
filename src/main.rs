//! TON OAuth Server
//!
//! Issues access tokens to TON wallets that prove key ownership with a signed
//! timestamp and are live on the ledger.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;

use ton_oauth_server::auth::SigningKeys;
use ton_oauth_server::config::Config;
use ton_oauth_server::{build_router, build_state, ledger};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{:#}", e), "Server failed");
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        environment = config.environment.as_str(),
        issuer = %config.issuer,
        "Starting TON OAuth server"
    );

    let keys = SigningKeys::load(
        &config.private_key_path,
        &config.public_key_path,
        &config.key_id,
    )
    .context("failed to load signing keys")?;
    tracing::info!(kid = keys.key_id(), "Signing keys loaded");

    let oracle = ledger::from_config(&config);
    tracing::info!(
        oracle = oracle.name(),
        url = ?config.ledger_url(),
        testnet = config.ton_testnet,
        "Ledger oracle configured"
    );

    let app_state = build_state(&config, keys, oracle);
    let app = build_router(app_state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("JWKS at http://{}/.well-known/jwks.json", addr);
    tracing::info!("Health check at http://{}/health", addr);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
