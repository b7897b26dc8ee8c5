//! # Product Search Server Main Driver
//!
//! ## Purpose
//! Main entry point for the product search service. Orchestrates startup:
//! configuration, logging, client initialization, the store readiness gate,
//! the startup cache flush, catalog ingestion, and finally the web server.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, command line arguments, environment
//!   variables
//! - **Output**: Running web server with product search API endpoints
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Connect store and cache clients
//! 4. Wait for the store to serve schema reads (readiness gate)
//! 5. Flush the response cache (best effort)
//! 6. Load the catalog if the collection is empty
//! 7. Start web API server and handle shutdown signals

use clap::{Arg, Command};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use semantic_product_search::{
    api::ApiServer,
    cache::{RedisCache, ResponseCache},
    config::Config,
    errors::{Result, SearchError},
    ingestion::{CatalogLoader, IngestionState},
    query::QueryEngine,
    readiness::wait_for_store_ready,
    store::{HttpStoreClient, ProductStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("product-search-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cache-aside product search API over a vector/full-text store")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("skip-ingestion")
                .long("skip-ingestion")
                .help("Start serving without running the catalog loader")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Probe the store and cache, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");
    let mut config = Config::from_file(config_path)?;

    // Override port if specified
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let config = Arc::new(config);

    // Initialize logging
    init_logging(&config)?;

    info!("Starting product search service v{}", env!("CARGO_PKG_VERSION"));
    if std::path::Path::new(config_path).exists() {
        info!("Configuration loaded from: {}", config_path);
    } else {
        warn!("Configuration file not found: {}, using defaults", config_path);
    }

    // Connect clients
    let store: Arc<dyn ProductStore> = Arc::new(HttpStoreClient::new(&config.store)?);
    let cache: Arc<dyn ResponseCache> = Arc::new(RedisCache::connect(&config.cache).await?);

    if matches.get_flag("check-health") {
        return run_health_checks(store.as_ref(), cache.as_ref()).await;
    }

    // The store rejects schema reads until its cluster is ready; nothing
    // below works before this gate opens
    wait_for_store_ready(
        store.as_ref(),
        config.store.readiness_retries,
        Duration::from_secs(config.store.readiness_delay_seconds),
    )
    .await?;

    // Cold-cache policy: stale entries from a previous catalog must not
    // outlive a restart. Best effort; the cache is a performance layer.
    if config.cache.flush_on_startup {
        match cache.flush_all().await {
            Ok(()) => info!("Response cache flushed"),
            Err(e) => warn!("Cache flush failed, continuing with warm cache: {}", e),
        }
    }

    let ingestion = IngestionState::new();

    if matches.get_flag("skip-ingestion") {
        warn!("Catalog ingestion skipped by flag");
    } else {
        let loader = CatalogLoader::new(
            config.ingestion.clone(),
            config.store.collection.clone(),
            store.clone(),
            ingestion.clone(),
        )?;
        let report = loader.run().await?;
        if report.skipped {
            info!("Catalog already loaded");
        } else {
            info!(
                records_inserted = report.records_inserted,
                duration = %semantic_product_search::utils::format_duration(
                    (report.finished_at - report.started_at)
                        .to_std()
                        .unwrap_or_default()
                ),
                "Catalog ingestion finished"
            );
        }
    }

    let query_engine = Arc::new(QueryEngine::new(
        store.clone(),
        cache.clone(),
        config.store.collection.clone(),
        config.cache.ttl_seconds,
        config.query.page_size,
        config.query.candidate_pool_size,
    ));

    let app_state = AppState {
        config: config.clone(),
        query_engine,
        store,
        cache,
        ingestion,
    };

    // Start the API server
    let server = ApiServer::new(app_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Product search service started on {}:{}",
        config.server.host, config.server.port
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = server_handle => {
            warn!("Server stopped unexpectedly");
        }
    }

    info!("Product search service shut down");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .map_err(|_| SearchError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        })?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer.with_filter(filter))
            .init();
    }

    info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

/// Probe both external collaborators once and report
async fn run_health_checks(store: &dyn ProductStore, cache: &dyn ResponseCache) -> Result<()> {
    info!("Running health checks...");

    store.list_schemas().await?;
    info!("Store is reachable");

    cache.ping().await?;
    info!("Cache is reachable");

    info!("All health checks passed");
    Ok(())
}
