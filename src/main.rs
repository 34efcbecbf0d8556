//! Narthex - REST facade over congregation records
//!
//! "Enter his gates with thanksgiving" - Psalm 100:4

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use narthex::{
    config::Args,
    db::{ConnectionProfile, MongoStore},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("narthex={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Narthex - Congregation Records API");
    info!("  \"Enter his gates with thanksgiving\"");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("MongoDB: {}", args.db_uri);
    info!("Namespace: {}", args.db_name);
    info!("Pool size: {}", args.pool_size);
    info!("Write timeout: {}ms", args.wtimeout_ms);
    info!("======================================");

    // Connect to MongoDB
    let profile = ConnectionProfile {
        pool_size: args.pool_size,
        wtimeout: args.wtimeout_ms,
    };
    let store = match MongoStore::connect(&args.db_uri, &args.db_name, profile).await {
        Ok(store) => {
            info!("MongoDB connected successfully");
            store
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Build application state and make sure every collection has its
    // unique identifier index before accepting traffic
    let state = server::AppState::new(args, store);
    for repo in &state.repos {
        if let Err(e) = repo.ensure_indexes().await {
            error!(
                "Index creation failed for collection '{}': {}",
                repo.spec().collection,
                e
            );
            std::process::exit(1);
        }
    }
    info!("Search indexes ready for {} collections", state.repos.len());

    let state = Arc::new(state);

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
