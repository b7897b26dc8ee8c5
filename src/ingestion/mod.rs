//! # Catalog Ingestion Module
//!
//! ## Purpose
//! Populates the store exactly once from the remote catalog feed: a
//! gzip-compressed, newline-delimited JSON resource. Resumable across
//! restarts through the exists/emptiness check, bounded by an optional
//! record cap, with a forced-refresh escape hatch.
//!
//! ## Input/Output Specification
//! - **Input**: Feed URL, record cap, force-refresh flag (configuration)
//! - **Output**: Populated product collection plus an [`IngestionReport`]
//! - **Workflow**: Check → (drop) → create → download → normalize → batch insert
//!
//! ## Key Features
//! - Idempotent: an already-populated collection skips ingestion entirely
//! - Dense 1-based `product_id` assignment from the stream position
//! - Fixed-size batches (50) with the trailing partial batch flushed, also
//!   when the record cap stops the stream mid-batch
//! - Batch insert or record parse failures abort the run; partial progress
//!   is left for the next restart's emptiness check to detect
//! - Progress logged every 1,000 records (advisory only)

use crate::config::IngestionConfig;
use crate::errors::{Result, SearchError};
use crate::record::{normalize_record, ProductRecord};
use crate::store::{product_schema_fields, ProductStore};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use reqwest::Client;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Process-wide ingestion completion flag. Written only by the loader at its
/// completion points; everything else (the health surface) reads it.
/// Not persisted: recomputed each start from store population.
#[derive(Clone, Default)]
pub struct IngestionState {
    complete: Arc<AtomicBool>,
}

impl IngestionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    fn mark_complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn mark_complete_for_tests(&self) {
        self.mark_complete();
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestionReport {
    /// Feed lines read (capped)
    pub records_read: u64,
    /// Records actually inserted into the store
    pub records_inserted: u64,
    /// True when the collection was already populated and ingestion skipped
    pub skipped: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Bulk catalog loader. Runs once at startup, before the process accepts
/// query traffic, so it never contends with requests for the store.
pub struct CatalogLoader {
    config: IngestionConfig,
    collection: String,
    store: Arc<dyn ProductStore>,
    state: IngestionState,
    client: Client,
}

impl CatalogLoader {
    pub fn new(
        config: IngestionConfig,
        collection: String,
        store: Arc<dyn ProductStore>,
        state: IngestionState,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_seconds))
            .user_agent("semantic-product-search/0.1")
            .build()
            .map_err(|e| SearchError::Network {
                operation: "loader client setup".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            config,
            collection,
            store,
            state,
            client,
        })
    }

    /// Run the full ingestion workflow. On every successful exit path
    /// (including "already populated" and an empty feed) the ingestion state
    /// is marked complete; on error it stays incomplete.
    pub async fn run(&self) -> Result<IngestionReport> {
        let started_at = Utc::now();

        if self.config.force_refresh && self.store.collection_exists(&self.collection).await? {
            self.store.delete_collection(&self.collection).await?;
            info!(collection = %self.collection, "Deleted collection for forced refresh");
        }

        if !self.store.collection_exists(&self.collection).await? {
            self.store
                .create_collection(&self.collection, &product_schema_fields())
                .await?;
            info!(collection = %self.collection, "Created collection schema");
        } else {
            let count = self.store.count_all(&self.collection).await?;
            if count > 0 {
                // Non-zero counts as fully loaded; an under-count from an
                // aborted run is not detected here (known gap).
                info!(
                    collection = %self.collection,
                    count, "Collection already populated; skipping ingestion"
                );
                self.state.mark_complete();
                return Ok(IngestionReport {
                    records_read: 0,
                    records_inserted: 0,
                    skipped: true,
                    started_at,
                    finished_at: Utc::now(),
                });
            }
            info!(collection = %self.collection, "Collection is empty; populating");
        }

        let body = self.download_feed().await?;
        let reader = BufReader::new(GzDecoder::new(body.as_slice()));
        let (records_read, records_inserted) = self.ingest_from_reader(reader).await?;

        info!(
            records_read,
            records_inserted, "Finished catalog ingestion"
        );
        self.state.mark_complete();

        Ok(IngestionReport {
            records_read,
            records_inserted,
            skipped: false,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Download the gzip feed into memory. The whole resource must be
    /// fetched to read its lines; the record cap bounds insertion, not
    /// download size.
    async fn download_feed(&self) -> Result<Vec<u8>> {
        if self.config.feed_url.is_empty() {
            return Err(SearchError::Config {
                message: "ingestion.feed_url is not set (RAW_URL)".to_string(),
            });
        }

        info!(url = %self.config.feed_url, "Downloading catalog feed");
        let response = self
            .client
            .get(&self.config.feed_url)
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: "feed download".to_string(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SearchError::IngestionFailed {
                details: format!("feed download returned HTTP {}", response.status()),
            });
        }

        let body = response.bytes().await.map_err(|e| SearchError::Network {
            operation: "feed download".to_string(),
            details: e.to_string(),
        })?;

        info!(bytes = body.len(), "Feed downloaded");
        Ok(body.to_vec())
    }

    /// Stream newline-delimited JSON records out of `reader`, normalize,
    /// and insert in fixed-size batches. Returns (records read, inserted).
    async fn ingest_from_reader<R: BufRead>(&self, reader: R) -> Result<(u64, u64)> {
        let cap = self.config.max_records;
        let batch_size = self.config.batch_size;

        let mut batch: Vec<ProductRecord> = Vec::with_capacity(batch_size);
        let mut records_read: u64 = 0;
        let mut records_inserted: u64 = 0;

        for (index, line) in reader.lines().enumerate() {
            // product_id is the 1-based position in the feed
            let product_id = index as u64 + 1;
            if let Some(cap) = cap {
                if product_id > cap {
                    break;
                }
            }

            let line = line?;
            let raw: Value =
                serde_json::from_str(&line).map_err(|e| SearchError::InvalidRecord {
                    line: product_id,
                    details: e.to_string(),
                })?;
            let record = normalize_record(&raw, product_id).map_err(|e| {
                SearchError::InvalidRecord {
                    line: product_id,
                    details: e.to_string(),
                }
            })?;

            records_read += 1;
            batch.push(record);

            if batch.len() == batch_size {
                self.flush_batch(&mut batch).await?;
                records_inserted += batch_size as u64;
                if records_inserted % self.config.progress_interval == 0 {
                    info!(records_inserted, "Ingestion progress");
                }
            }
        }

        // Trailing partial batch, including the one a cap cut short
        if !batch.is_empty() {
            records_inserted += batch.len() as u64;
            self.flush_batch(&mut batch).await?;
        }

        if records_read == 0 {
            warn!("Catalog feed contained no records");
        }

        Ok((records_read, records_inserted))
    }

    /// Insert one batch; failure is fatal to the run, not retried
    async fn flush_batch(&self, batch: &mut Vec<ProductRecord>) -> Result<()> {
        self.store
            .insert_many(&self.collection, batch)
            .await
            .map_err(|e| SearchError::IngestionFailed {
                details: format!("batch insert failed: {}", e),
            })?;
        batch.clear();
        Ok(())
    }
}
