//! # Cache-Aside Query Engine
//!
//! ## Purpose
//! Answers the four read query shapes against the store, using the cache to
//! avoid repeat store round-trips. Every request is independent: check cache,
//! on miss query the store, rank/transform, write through to the cache,
//! respond.
//!
//! ## Query shapes and fingerprints
//! | Query            | Cache key             | Store call on miss            |
//! |------------------|-----------------------|-------------------------------|
//! | Lookup by id     | `product_id:<id>`     | exact-match filter, limit 1   |
//! | Free-text query  | `query:<text>`        | keyword search, limit 20      |
//! | Default listing  | (uncached)            | unfiltered fetch, limit 20    |
//! | Ranked listing   | fixed name per kind   | top-200 by rating count, then |
//! |                  |                       | stable re-sort by avg rating  |
//!
//! ## Key Features
//! - Write-through caching with a fixed TTL (3600 s); cache write failures
//!   cost a performance opportunity, never correctness
//! - Two-stage ranked listings: the store sorts by one key only, so the
//!   broad candidate pool is re-ranked client-side by the secondary signal
//!   with a stable sort, then truncated
//! - No retries at request time; transport failures surface to the handler

use crate::cache::ResponseCache;
use crate::errors::Result;
use crate::record::ProductRecord;
use crate::store::ProductStore;
use crate::utils::Timer;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ranked-listing flavors. All three rank by the same signals today; the
/// fixed cache keys keep their entries distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankedListing {
    Trending,
    BestSellers,
    Popular,
}

impl RankedListing {
    /// Fixed cache fingerprint for this listing
    pub fn cache_key(&self) -> &'static str {
        match self {
            RankedListing::Trending => "trending_products",
            RankedListing::BestSellers => "best_sellers",
            RankedListing::Popular => "popular_products",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RankedListing::Trending => "trending",
            RankedListing::BestSellers => "best-sellers",
            RankedListing::Popular => "popular",
        }
    }
}

/// Read-only query engine over the injected store and cache handles.
/// Handles are created once at startup and shared across all requests;
/// the engine keeps no per-request state.
pub struct QueryEngine {
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn ResponseCache>,
    collection: String,
    ttl_seconds: u64,
    page_size: usize,
    candidate_pool_size: usize,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn ResponseCache>,
        collection: String,
        ttl_seconds: u64,
        page_size: usize,
        candidate_pool_size: usize,
    ) -> Self {
        Self {
            store,
            cache,
            collection,
            ttl_seconds,
            page_size,
            candidate_pool_size,
        }
    }

    /// Lookup one product by its id. `Ok(None)` is a valid "not found"
    /// outcome, distinct from transport errors.
    pub async fn product_by_id(&self, product_id: u64) -> Result<Option<ProductRecord>> {
        let timer = Timer::new("product_by_id");
        let key = format!("product_id:{}", product_id);

        if let Some(cached) = self.cache.get(&key).await? {
            info!(product_id, "Cache hit for product lookup");
            return Ok(Some(serde_json::from_str(&cached)?));
        }

        let results = self
            .store
            .filter_equal(&self.collection, "product_id", product_id as i64, 1)
            .await?;

        let record = match results.into_iter().next() {
            Some(record) => record,
            None => {
                debug!(product_id, "Product not found");
                return Ok(None);
            }
        };

        self.write_through(&key, &serde_json::to_string(&record)?).await;
        debug!(product_id, duration_ms = timer.elapsed_ms(), "Product lookup served from store");
        Ok(Some(record))
    }

    /// Keyword-ranked free-text search
    pub async fn search(&self, query: &str) -> Result<Vec<ProductRecord>> {
        let timer = Timer::new("search");
        let key = format!("query:{}", query);

        if let Some(cached) = self.cache.get(&key).await? {
            info!(query, "Cache hit for text query");
            return Ok(serde_json::from_str(&cached)?);
        }

        let products = self
            .store
            .keyword_search(&self.collection, query, self.page_size)
            .await?;

        self.write_through(&key, &serde_json::to_string(&products)?).await;
        debug!(
            query,
            results = products.len(),
            duration_ms = timer.elapsed_ms(),
            "Text query served from store"
        );
        Ok(products)
    }

    /// Unfiltered default listing; intentionally uncached
    pub async fn default_listing(&self) -> Result<Vec<ProductRecord>> {
        self.store
            .fetch_all(&self.collection, self.page_size, None, false)
            .await
    }

    /// Two-stage ranked listing. The store's native sort supports a single
    /// key: the primary signal (rating count) selects the candidate pool,
    /// the secondary signal (average rating) decides the final order and
    /// which records survive truncation. The sort is stable, so secondary
    /// ties keep the primary order.
    pub async fn ranked_listing(&self, listing: RankedListing) -> Result<Vec<ProductRecord>> {
        let timer = Timer::new("ranked_listing");
        let key = listing.cache_key();

        if let Some(cached) = self.cache.get(key).await? {
            info!(listing = listing.label(), "Cache hit for ranked listing");
            return Ok(serde_json::from_str(&cached)?);
        }

        let mut candidates = self
            .store
            .fetch_all(
                &self.collection,
                self.candidate_pool_size,
                Some("rating_number"),
                false,
            )
            .await?;

        if candidates.is_empty() {
            // A valid, expected outcome; the handler reports it as a
            // logical failure, not an infrastructure error
            return Ok(Vec::new());
        }

        candidates.sort_by(|a, b| {
            b.average_rating
                .partial_cmp(&a.average_rating)
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(self.page_size);

        self.write_through(key, &serde_json::to_string(&candidates)?).await;
        debug!(
            listing = listing.label(),
            results = candidates.len(),
            duration_ms = timer.elapsed_ms(),
            "Ranked listing served from store"
        );
        Ok(candidates)
    }

    /// Cache write on the miss path. A failure here loses a performance
    /// opportunity, never correctness, so it is logged and swallowed.
    async fn write_through(&self, key: &str, payload: &str) {
        if let Err(e) = self
            .cache
            .set_with_expiry(key, payload, self.ttl_seconds)
            .await
        {
            warn!(key, "Cache write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::errors::SearchError;
    use crate::store::SchemaField;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::sync::Mutex;

    fn record(product_id: u64, rating_number: i64, average_rating: f64) -> ProductRecord {
        ProductRecord {
            product_id,
            title: format!("Item {}", product_id),
            store: String::new(),
            description: String::new(),
            features: vec![],
            average_rating,
            rating_number,
            price: -1.0,
            details: "{}".to_string(),
            main_hi_res_image: String::new(),
        }
    }

    #[derive(Default)]
    struct FakeStore {
        records: Mutex<Vec<ProductRecord>>,
        filter_calls: AtomicU32,
        search_calls: AtomicU32,
        fetch_calls: AtomicU32,
    }

    #[async_trait]
    impl ProductStore for FakeStore {
        async fn list_schemas(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn collection_exists(&self, _: &str) -> Result<bool> {
            Ok(true)
        }
        async fn create_collection(&self, _: &str, _: &[SchemaField]) -> Result<()> {
            Ok(())
        }
        async fn delete_collection(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn insert_many(&self, _: &str, _: &[ProductRecord]) -> Result<()> {
            Ok(())
        }
        async fn count_all(&self, _: &str) -> Result<u64> {
            Ok(self.records.lock().unwrap().len() as u64)
        }
        async fn filter_equal(
            &self,
            _: &str,
            _: &str,
            value: i64,
            limit: usize,
        ) -> Result<Vec<ProductRecord>> {
            self.filter_calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.product_id as i64 == value)
                .take(limit)
                .cloned()
                .collect())
        }
        async fn keyword_search(&self, _: &str, _: &str, limit: usize) -> Result<Vec<ProductRecord>> {
            self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self.records.lock().unwrap().iter().take(limit).cloned().collect())
        }
        async fn semantic_search(&self, _: &str, _: &str, limit: usize) -> Result<Vec<ProductRecord>> {
            Ok(self.records.lock().unwrap().iter().take(limit).cloned().collect())
        }
        async fn fetch_all(
            &self,
            _: &str,
            limit: usize,
            sort_field: Option<&str>,
            ascending: bool,
        ) -> Result<Vec<ProductRecord>> {
            self.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
            let mut records = self.records.lock().unwrap().clone();
            if let Some("rating_number") = sort_field {
                records.sort_by_key(|r| if ascending { r.rating_number } else { -r.rating_number });
            }
            records.truncate(limit);
            Ok(records)
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<String, String>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl ResponseCache for FakeCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }
        async fn set_with_expiry(&self, key: &str, value: &str, _: u64) -> Result<()> {
            if self.fail_writes {
                return Err(SearchError::Cache {
                    operation: "setex".to_string(),
                    details: "down".to_string(),
                });
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn flush_all(&self) -> Result<()> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn engine(store: Arc<FakeStore>, cache: Arc<FakeCache>) -> QueryEngine {
        QueryEngine::new(store, cache, "Product".to_string(), 3600, 20, 200)
    }

    #[tokio::test]
    async fn cold_then_warm_lookup_hits_store_once() {
        let store = Arc::new(FakeStore::default());
        store.records.lock().unwrap().push(record(42, 10, 4.0));
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        let first = engine.product_by_id(42).await.unwrap().unwrap();
        let second = engine.product_by_id(42).await.unwrap().unwrap();

        assert_eq!(store.filter_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_id_is_not_found_and_not_cached() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        assert!(engine.product_by_id(999).await.unwrap().is_none());
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_search_writes_through_under_query_key() {
        let store = Arc::new(FakeStore::default());
        store.records.lock().unwrap().push(record(1, 5, 3.0));
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        let first = engine.search("red scarf").await.unwrap();
        assert!(cache.entries.lock().unwrap().contains_key("query:red scarf"));

        let second = engine.search("red scarf").await.unwrap();
        assert_eq!(store.search_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ranked_listing_reranks_stably_and_truncates() {
        let store = Arc::new(FakeStore::default());
        {
            let mut records = store.records.lock().unwrap();
            // Distinct rating counts pick the primary order; tied average
            // ratings must preserve it
            records.push(record(1, 500, 4.0));
            records.push(record(2, 400, 4.0));
            records.push(record(3, 300, 4.8));
            records.push(record(4, 200, 4.0));
            for i in 5..=40 {
                records.push(record(i, 100 - i as i64, 1.0));
            }
        }
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        let listing = engine.ranked_listing(RankedListing::Trending).await.unwrap();
        assert_eq!(listing.len(), 20);
        // Highest average rating first, then the 4.0 tie in primary order
        let ids: Vec<u64> = listing.iter().take(4).map(|r| r.product_id).collect();
        assert_eq!(ids, vec![3, 1, 2, 4]);
        assert!(cache.entries.lock().unwrap().contains_key("trending_products"));
    }

    #[tokio::test]
    async fn ranked_listing_kinds_use_distinct_keys() {
        let store = Arc::new(FakeStore::default());
        store.records.lock().unwrap().push(record(1, 5, 3.0));
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        engine.ranked_listing(RankedListing::BestSellers).await.unwrap();
        engine.ranked_listing(RankedListing::Popular).await.unwrap();

        let entries = cache.entries.lock().unwrap();
        assert!(entries.contains_key("best_sellers"));
        assert!(entries.contains_key("popular_products"));
    }

    #[tokio::test]
    async fn empty_candidate_pool_is_not_cached() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        let listing = engine.ranked_listing(RankedListing::Trending).await.unwrap();
        assert!(listing.is_empty());
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_write_failure_does_not_fail_the_request() {
        let store = Arc::new(FakeStore::default());
        store.records.lock().unwrap().push(record(7, 5, 3.0));
        let cache = Arc::new(FakeCache {
            fail_writes: true,
            ..FakeCache::default()
        });
        let engine = engine(store.clone(), cache);

        let result = engine.product_by_id(7).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn default_listing_bypasses_the_cache() {
        let store = Arc::new(FakeStore::default());
        store.records.lock().unwrap().push(record(1, 5, 3.0));
        let cache = Arc::new(FakeCache::default());
        let engine = engine(store.clone(), cache.clone());

        engine.default_listing().await.unwrap();
        engine.default_listing().await.unwrap();

        assert_eq!(store.fetch_calls.load(AtomicOrdering::SeqCst), 2);
        assert!(cache.entries.lock().unwrap().is_empty());
    }
}
