//! Pinged Realtime Gateway -- presence tracking and message delivery.
//!
//! An axum WebSocket server that authenticates connections with session
//! tokens, persists every direct message, and pushes messages and read
//! receipts to recipients' live connections. A small HTTP surface over
//! the same store serves conversation history.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! PINGED_JWT_SECRET=... cargo run --bin pinged-gateway
//!
//! # Run on custom address
//! PINGED_JWT_SECRET=... cargo run --bin pinged-gateway -- --bind 127.0.0.1:8080
//! ```

use std::sync::Arc;

use clap::Parser;
use pinged_gateway::config::{GatewayCliArgs, GatewayConfig};
use pinged_gateway::gateway::{self, GatewayState};
use pinged_gateway::store::MemoryStore;

#[tokio::main]
async fn main() {
    let cli = GatewayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match GatewayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting pinged gateway");

    let state = Arc::new(GatewayState::with_config(MemoryStore::new(), &config));

    match gateway::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "gateway listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "gateway server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start gateway");
            std::process::exit(1);
        }
    }
}
