//! Bingo Hall server binary.
//!
//! Reads its configuration from the environment (see `config.rs`), picks
//! the authenticator and store accordingly, and serves until Ctrl-C.

mod config;

use std::sync::Arc;

use bingohall::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

const DEFAULT_FILTER: &str = "info,bingohall=debug";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind,
        draw_interval_ms = config.engine.draw_interval.as_millis() as u64,
        "starting Bingo Hall"
    );

    match config.bot_token.clone() {
        Some(token) => {
            info!("using Telegram init-data authentication");
            with_store(&config, TelegramAuthenticator::new(&token)).await?;
        }
        None => {
            warn!("no bot token set, falling back to development authentication");
            with_store(&config, DevAuthenticator).await?;
        }
    }

    info!("Bingo Hall stopped");
    Ok(())
}

async fn with_store<A: Authenticator>(config: &ServerConfig, auth: A) -> Result<(), BingoError> {
    match &config.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "persisting to JSON files");
            let store = JsonFileStore::open(dir).await?;
            serve(config, auth, Arc::new(store)).await
        }
        None => {
            info!("keeping state in memory");
            serve(config, auth, Arc::new(MemoryStore::new())).await
        }
    }
}

async fn serve<A: Authenticator, S: Store>(
    config: &ServerConfig,
    auth: A,
    store: Arc<S>,
) -> Result<(), BingoError> {
    let server = ServerBuilder::new()
        .bind(&config.bind.to_string())
        .engine_config(config.engine.clone())
        .build(auth, store)
        .await?;
    server.run_until(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
