//! # Semantic Product Search
//!
//! ## Overview
//! This library implements a cache-aside product search service: an HTTP API
//! over a vector/full-text store holding a normalized product catalog, with a
//! key-value cache absorbing repeat queries.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `record`: Raw catalog record normalization into the fixed product shape
//! - `store`: Client for the vector/full-text store (schema, inserts, queries)
//! - `cache`: Client for the key-value response cache
//! - `readiness`: Startup gate that waits for the store to serve schema reads
//! - `ingestion`: One-shot catalog loader feeding the store from the remote feed
//! - `query`: Cache-aside query engine (lookup, search, ranked listings)
//! - `api`: REST API endpoints
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Gzip newline-delimited JSON catalog feed, HTTP search queries
//! - **Output**: JSON product envelopes, ranked product listings
//! - **Startup**: readiness gate → cache flush → catalog load → serve
//!
//! ## Usage
//! ```rust,no_run
//! use semantic_product_search::{Config, QueryEngine};
//! use semantic_product_search::cache::RedisCache;
//! use semantic_product_search::store::HttpStoreClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let store = Arc::new(HttpStoreClient::new(&config.store)?);
//!     let cache = Arc::new(RedisCache::connect(&config.cache).await?);
//!     let engine = QueryEngine::new(
//!         store,
//!         cache,
//!         config.store.collection.clone(),
//!         config.cache.ttl_seconds,
//!         config.query.page_size,
//!         config.query.candidate_pool_size,
//!     );
//!     let products = engine.search("wool scarf").await?;
//!     println!("Found {} products", products.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod ingestion;
pub mod query;
pub mod readiness;
pub mod record;
pub mod store;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{Result, SearchError};
pub use query::{QueryEngine, RankedListing};
pub use record::ProductRecord;

use std::sync::Arc;

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub query_engine: Arc<query::QueryEngine>,
    pub store: Arc<dyn store::ProductStore>,
    pub cache: Arc<dyn cache::ResponseCache>,
    pub ingestion: ingestion::IngestionState,
}
