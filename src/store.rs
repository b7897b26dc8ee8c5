//! # Store Client Module
//!
//! ## Purpose
//! Client for the external vector/full-text search store holding the product
//! collection. The query engine and catalog loader depend on the
//! [`ProductStore`] trait; the HTTP implementation speaks a Weaviate-style
//! REST + GraphQL surface.
//!
//! ## Input/Output Specification
//! - **Input**: Collection names, product records, query parameters
//! - **Output**: Typed product records, counts, schema information
//! - **Transport**: JSON over HTTP; all failures map to `SearchError`
//!
//! ## Key Features
//! - Schema management (exists / create / delete) for the loader
//! - Batch inserts with per-object error surfacing
//! - Exact-match filter, keyword-ranked and semantic-similarity queries
//! - Sorted scans limited to a single sort key (the store's native limit)

use crate::config::StoreConfig;
use crate::errors::{Result, SearchError};
use crate::record::ProductRecord;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Property selection used by every record-returning GraphQL query
const RECORD_FIELDS: &str = "product_id title store description features \
average_rating rating_number price details main_hi_res_image";

/// One field of a collection schema
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: &'static str,
    pub data_type: &'static str,
}

/// Schema of the product collection, mirroring [`ProductRecord`]
pub fn product_schema_fields() -> Vec<SchemaField> {
    vec![
        SchemaField { name: "product_id", data_type: "int" },
        SchemaField { name: "title", data_type: "text" },
        SchemaField { name: "store", data_type: "text" },
        SchemaField { name: "description", data_type: "text" },
        SchemaField { name: "features", data_type: "text[]" },
        SchemaField { name: "average_rating", data_type: "number" },
        SchemaField { name: "rating_number", data_type: "int" },
        SchemaField { name: "price", data_type: "number" },
        SchemaField { name: "details", data_type: "text" },
        SchemaField { name: "main_hi_res_image", data_type: "text" },
    ]
}

/// Contract the core depends on; implemented over HTTP in production and by
/// in-memory fakes in tests.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Lightweight schema/metadata call; fails while the store is unreachable
    /// or not yet authorized (the readiness gate polls this).
    async fn list_schemas(&self) -> Result<Vec<String>>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    async fn create_collection(&self, name: &str, fields: &[SchemaField]) -> Result<()>;

    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn insert_many(&self, name: &str, records: &[ProductRecord]) -> Result<()>;

    async fn count_all(&self, name: &str) -> Result<u64>;

    /// Exact-match filter on an integer property
    async fn filter_equal(
        &self,
        name: &str,
        field: &str,
        value: i64,
        limit: usize,
    ) -> Result<Vec<ProductRecord>>;

    /// Keyword-ranked (BM25) search
    async fn keyword_search(&self, name: &str, text: &str, limit: usize)
        -> Result<Vec<ProductRecord>>;

    /// Semantic-similarity search
    async fn semantic_search(&self, name: &str, text: &str, limit: usize)
        -> Result<Vec<ProductRecord>>;

    /// Unfiltered scan, optionally sorted by one property
    async fn fetch_all(
        &self,
        name: &str,
        limit: usize,
        sort_field: Option<&str>,
        ascending: bool,
    ) -> Result<Vec<ProductRecord>>;
}

/// HTTP implementation of [`ProductStore`]
pub struct HttpStoreClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    classes: Vec<SchemaClass>,
}

#[derive(Debug, Deserialize)]
struct SchemaClass {
    class: String,
}

impl HttpStoreClient {
    /// Create a new store client from configuration
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("semantic-product-search/0.1")
            .build()
            .map_err(|e| SearchError::Network {
                operation: "client setup".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute a GraphQL query and return the objects under
    /// `data.Get.<collection>`, deserialized into product records.
    async fn graphql_records(
        &self,
        operation: &str,
        collection: &str,
        query: String,
    ) -> Result<Vec<ProductRecord>> {
        let data = self.graphql(operation, query).await?;

        let objects = data
            .pointer(&format!("/Get/{}", collection))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        objects
            .into_iter()
            .map(|obj| {
                serde_json::from_value(obj).map_err(|e| SearchError::DataParsing {
                    origin: format!("store response ({})", operation),
                    details: e.to_string(),
                })
            })
            .collect()
    }

    /// Execute a GraphQL query and return its `data` payload
    async fn graphql(&self, operation: &str, query: String) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint("/v1/graphql"))
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: operation.to_string(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SearchError::Store {
                operation: operation.to_string(),
                details: format!("HTTP {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| SearchError::DataParsing {
            origin: format!("store response ({})", operation),
            details: e.to_string(),
        })?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(SearchError::Store {
                    operation: operation.to_string(),
                    details: errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; "),
                });
            }
        }

        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ProductStore for HttpStoreClient {
    async fn list_schemas(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint("/v1/schema"))
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: "list_schemas".to_string(),
                details: e.to_string(),
            })?;

        // 401/403 happens while the store is electing a leader and has not
        // authorized schema reads yet; the readiness gate retries this class.
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SearchError::StoreNotReady {
                    details: format!("schema endpoint returned {}", response.status()),
                });
            }
            status if !status.is_success() => {
                return Err(SearchError::Store {
                    operation: "list_schemas".to_string(),
                    details: format!("HTTP {}", status),
                });
            }
            _ => {}
        }

        let schema: SchemaResponse =
            response.json().await.map_err(|e| SearchError::DataParsing {
                origin: "store response (list_schemas)".to_string(),
                details: e.to_string(),
            })?;

        Ok(schema.classes.into_iter().map(|c| c.class).collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint(&format!("/v1/schema/{}", name)))
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: "collection_exists".to_string(),
                details: e.to_string(),
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(SearchError::Store {
                operation: "collection_exists".to_string(),
                details: format!("HTTP {}", status),
            }),
        }
    }

    async fn create_collection(&self, name: &str, fields: &[SchemaField]) -> Result<()> {
        let properties: Vec<Value> = fields
            .iter()
            .map(|f| json!({ "name": f.name, "dataType": [f.data_type] }))
            .collect();

        let response = self
            .client
            .post(self.endpoint("/v1/schema"))
            .json(&json!({ "class": name, "vectorizer": "none", "properties": properties }))
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: "create_collection".to_string(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SearchError::Store {
                operation: "create_collection".to_string(),
                details: format!(
                    "HTTP {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                ),
            });
        }

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&format!("/v1/schema/{}", name)))
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: "delete_collection".to_string(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SearchError::Store {
                operation: "delete_collection".to_string(),
                details: format!("HTTP {}", response.status()),
            });
        }

        Ok(())
    }

    async fn insert_many(&self, name: &str, records: &[ProductRecord]) -> Result<()> {
        let objects: Vec<Value> = records
            .iter()
            .map(|record| {
                serde_json::to_value(record).map(|properties| {
                    json!({ "class": name, "properties": properties })
                })
            })
            .collect::<std::result::Result<_, _>>()?;

        let response = self
            .client
            .post(self.endpoint("/v1/batch/objects"))
            .json(&json!({ "objects": objects }))
            .send()
            .await
            .map_err(|e| SearchError::Network {
                operation: "insert_many".to_string(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SearchError::Store {
                operation: "insert_many".to_string(),
                details: format!("HTTP {}", response.status()),
            });
        }

        // A batch can succeed at the HTTP level while individual objects fail
        let results: Vec<Value> =
            response.json().await.map_err(|e| SearchError::DataParsing {
                origin: "store response (insert_many)".to_string(),
                details: e.to_string(),
            })?;

        for result in &results {
            if let Some(errors) = result.pointer("/result/errors/error") {
                return Err(SearchError::Store {
                    operation: "insert_many".to_string(),
                    details: errors.to_string(),
                });
            }
        }

        Ok(())
    }

    async fn count_all(&self, name: &str) -> Result<u64> {
        let query = format!("{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}", name);
        let data = self.graphql("count_all", query).await?;

        data.pointer(&format!("/Aggregate/{}/0/meta/count", name))
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchError::DataParsing {
                origin: "store response (count_all)".to_string(),
                details: "missing aggregate count".to_string(),
            })
    }

    async fn filter_equal(
        &self,
        name: &str,
        field: &str,
        value: i64,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        let query = format!(
            "{{ Get {{ {name}(where: {{path: [\"{field}\"], operator: Equal, \
             valueInt: {value}}}, limit: {limit}) {{ {RECORD_FIELDS} }} }} }}",
        );
        self.graphql_records("filter_equal", name, query).await
    }

    async fn keyword_search(
        &self,
        name: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        // serde_json string encoding doubles as GraphQL string escaping
        let escaped = serde_json::to_string(text)?;
        let query = format!(
            "{{ Get {{ {name}(bm25: {{query: {escaped}}}, limit: {limit}) \
             {{ {RECORD_FIELDS} }} }} }}",
        );
        self.graphql_records("keyword_search", name, query).await
    }

    async fn semantic_search(
        &self,
        name: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        let escaped = serde_json::to_string(text)?;
        let query = format!(
            "{{ Get {{ {name}(nearText: {{concepts: [{escaped}]}}, limit: {limit}) \
             {{ {RECORD_FIELDS} }} }} }}",
        );
        self.graphql_records("semantic_search", name, query).await
    }

    async fn fetch_all(
        &self,
        name: &str,
        limit: usize,
        sort_field: Option<&str>,
        ascending: bool,
    ) -> Result<Vec<ProductRecord>> {
        let sort_clause = match sort_field {
            Some(field) => {
                let order = if ascending { "asc" } else { "desc" };
                format!(", sort: [{{path: [\"{}\"], order: {}}}]", field, order)
            }
            None => String::new(),
        };
        let query = format!(
            "{{ Get {{ {name}(limit: {limit}{sort_clause}) {{ {RECORD_FIELDS} }} }} }}",
        );
        self.graphql_records("fetch_all", name, query).await
    }
}
