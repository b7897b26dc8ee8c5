//! # Readiness Gate Module
//!
//! ## Purpose
//! Blocks dependent startup work until the store answers schema reads. Some
//! store deployments reject schema queries while a cluster leader is being
//! elected; that failure class is transient and worth waiting out.
//!
//! ## Contract
//! - Poll the store's schema endpoint up to `retries` times with a fixed
//!   `delay` between attempts (defaults 30 attempts / 2 s, from configuration)
//! - Retry only the not-yet-authorized class; any other failure propagates
//!   immediately
//! - Exhausting retries is a fatal startup error; the process must not begin
//!   serving traffic

use crate::errors::{Result, SearchError};
use crate::store::ProductStore;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait until the store serves schema reads, or fail startup.
pub async fn wait_for_store_ready(
    store: &dyn ProductStore,
    retries: u32,
    delay: Duration,
) -> Result<()> {
    for attempt in 1..=retries {
        match store.list_schemas().await {
            Ok(_) => {
                info!("Store schema is available");
                return Ok(());
            }
            Err(e) if e.is_transient() => {
                warn!(attempt, retries, "Store not ready: {}", e);
                if attempt < retries {
                    sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(SearchError::StoreNotReady {
        details: format!("store never became ready after {} attempts", retries),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ProductRecord;
    use crate::store::SchemaField;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store fake that stays unauthorized for a configured number of calls
    struct FlakyStore {
        calls: AtomicU32,
        ready_after: u32,
        fatal: bool,
    }

    #[async_trait]
    impl ProductStore for FlakyStore {
        async fn list_schemas(&self) -> Result<Vec<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fatal {
                return Err(SearchError::Store {
                    operation: "list_schemas".to_string(),
                    details: "boom".to_string(),
                });
            }
            if call >= self.ready_after {
                Ok(vec!["Product".to_string()])
            } else {
                Err(SearchError::StoreNotReady {
                    details: "leader not elected".to_string(),
                })
            }
        }

        async fn collection_exists(&self, _: &str) -> Result<bool> {
            unimplemented!()
        }
        async fn create_collection(&self, _: &str, _: &[SchemaField]) -> Result<()> {
            unimplemented!()
        }
        async fn delete_collection(&self, _: &str) -> Result<()> {
            unimplemented!()
        }
        async fn insert_many(&self, _: &str, _: &[ProductRecord]) -> Result<()> {
            unimplemented!()
        }
        async fn count_all(&self, _: &str) -> Result<u64> {
            unimplemented!()
        }
        async fn filter_equal(&self, _: &str, _: &str, _: i64, _: usize) -> Result<Vec<ProductRecord>> {
            unimplemented!()
        }
        async fn keyword_search(&self, _: &str, _: &str, _: usize) -> Result<Vec<ProductRecord>> {
            unimplemented!()
        }
        async fn semantic_search(&self, _: &str, _: &str, _: usize) -> Result<Vec<ProductRecord>> {
            unimplemented!()
        }
        async fn fetch_all(
            &self,
            _: &str,
            _: usize,
            _: Option<&str>,
            _: bool,
        ) -> Result<Vec<ProductRecord>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_ready() {
        let store = FlakyStore {
            calls: AtomicU32::new(0),
            ready_after: 3,
            fatal: false,
        };
        wait_for_store_ready(&store, 5, Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_retries_is_fatal() {
        let store = FlakyStore {
            calls: AtomicU32::new(0),
            ready_after: u32::MAX,
            fatal: false,
        };
        let err = wait_for_store_ready(&store, 4, Duration::from_millis(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::StoreNotReady { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_transient_errors_propagate_immediately() {
        let store = FlakyStore {
            calls: AtomicU32::new(0),
            ready_after: 1,
            fatal: true,
        };
        let err = wait_for_store_ready(&store, 10, Duration::from_millis(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Store { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
