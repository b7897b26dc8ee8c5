//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the product search service, supporting a TOML
//! file with environment-variable overrides and validation.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)
//!
//! ## Environment variables
//! `PRODUCT_SEARCH_HOST`, `PRODUCT_SEARCH_PORT`, `PRODUCT_SEARCH_STORE_URL`,
//! `PRODUCT_SEARCH_CACHE_URL`, `RAW_URL`, `NO_OF_PRODUCTS`, `FORCE_REFRESH_DB`

use crate::errors::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Vector/full-text store connection
    pub store: StoreConfig,
    /// Key-value response cache connection
    pub cache: CacheConfig,
    /// Catalog feed ingestion settings
    pub ingestion: IngestionConfig,
    /// Query engine behavior
    pub query: QueryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable permissive CORS for web frontends
    pub enable_cors: bool,
}

/// Store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store's HTTP API
    pub url: String,
    /// Collection holding product records
    pub collection: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Readiness gate: schema poll attempts
    pub readiness_retries: u32,
    /// Readiness gate: delay between attempts in seconds
    pub readiness_delay_seconds: u64,
}

/// Cache connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache connection URL
    pub url: String,
    /// Time-to-live for cached query results in seconds
    pub ttl_seconds: u64,
    /// Clear all cache entries at process startup (best effort)
    pub flush_on_startup: bool,
}

/// Catalog feed ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// URL of the gzip-compressed newline-delimited JSON feed
    pub feed_url: String,
    /// Optional cap on the number of records to ingest
    pub max_records: Option<u64>,
    /// Destroy and recreate the collection before the emptiness check
    pub force_refresh: bool,
    /// Batch size for bulk inserts
    pub batch_size: usize,
    /// Emit a progress log line every this many records
    pub progress_interval: u64,
    /// Feed download timeout in seconds
    pub download_timeout_seconds: u64,
}

/// Query engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Result limit for text search and listings
    pub page_size: usize,
    /// Candidate pool size for ranked listings before client-side re-rank
    pub candidate_pool_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://weaviate:8080".to_string(),
            collection: "Product".to_string(),
            timeout_seconds: 30,
            readiness_retries: 30,
            readiness_delay_seconds: 2,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://redis:6379/0".to_string(),
            ttl_seconds: 3600,
            flush_on_startup: true,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            max_records: None,
            force_refresh: false,
            batch_size: 50,
            progress_interval: 1000,
            download_timeout_seconds: 600,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            candidate_pool_size: 200,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            ingestion: IngestionConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file, falling back to defaults when
    /// the file does not exist. Environment overrides apply either way.
    /// Silent on the fallback: this runs before logging is initialized, so
    /// the caller reports the missing file once logging is up.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| SearchError::Config {
                message: format!("Failed to read config file {:?}: {}", path, e),
            })?;
            toml::from_str(&content).map_err(|e| SearchError::Config {
                message: format!("Failed to parse config file {:?}: {}", path, e),
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("PRODUCT_SEARCH_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PRODUCT_SEARCH_PORT") {
            self.server.port = port.parse().map_err(|_| SearchError::Config {
                message: "Invalid port number in PRODUCT_SEARCH_PORT".to_string(),
            })?;
        }
        if let Ok(url) = std::env::var("PRODUCT_SEARCH_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(url) = std::env::var("PRODUCT_SEARCH_CACHE_URL") {
            self.cache.url = url;
        }
        if let Ok(url) = std::env::var("RAW_URL") {
            self.ingestion.feed_url = url;
        }
        if let Ok(cap) = std::env::var("NO_OF_PRODUCTS") {
            self.ingestion.max_records = Some(cap.parse().map_err(|_| SearchError::Config {
                message: "Invalid record cap in NO_OF_PRODUCTS".to_string(),
            })?);
        }
        if let Ok(force) = std::env::var("FORCE_REFRESH_DB") {
            self.ingestion.force_refresh = force.eq_ignore_ascii_case("true");
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(SearchError::Config {
                message: "server.port cannot be zero".to_string(),
            });
        }
        if self.ingestion.batch_size == 0 {
            return Err(SearchError::Config {
                message: "ingestion.batch_size must be greater than zero".to_string(),
            });
        }
        if self.query.candidate_pool_size < self.query.page_size {
            return Err(SearchError::Config {
                message: "query.candidate_pool_size cannot be smaller than query.page_size"
                    .to_string(),
            });
        }
        if self.store.collection.is_empty() {
            return Err(SearchError::Config {
                message: "store.collection cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingestion.batch_size, 50);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.query.candidate_pool_size, 200);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::from_file("/nonexistent/product-search.toml").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.store.collection, "Product");
        assert_eq!(config.ingestion.batch_size, 50);
    }

    #[test]
    fn rejects_undersized_candidate_pool() {
        let mut config = Config::default();
        config.query.candidate_pool_size = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("NO_OF_PRODUCTS", "250");
        std::env::set_var("FORCE_REFRESH_DB", "TRUE");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.ingestion.max_records, Some(250));
        assert!(config.ingestion.force_refresh);
        std::env::remove_var("NO_OF_PRODUCTS");
        std::env::remove_var("FORCE_REFRESH_DB");
    }
}
