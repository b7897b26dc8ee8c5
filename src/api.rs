//! # API Server Module
//!
//! ## Purpose
//! REST API server exposing the product query surface: lookup by id,
//! free-text search, the default listing, the three ranked listings, and a
//! health endpoint.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP GET requests with query-string parameters
//! - **Output**: JSON envelopes `{ok: true, product|products}` on success,
//!   `{ok: false, error}` on failure
//! - **Status codes**: 400 for an unparseable product id, 404 for a missing
//!   product, 500 for store/cache transport failures; an empty ranked pool is
//!   a logical failure reported with 200
//!
//! ## Key Features
//! - Lookup-by-id takes precedence over free-text query when both are present
//! - CORS support for web frontends
//! - Request handlers stay thin; ranking and caching live in the query engine

use crate::errors::SearchError;
use crate::query::RankedListing;
use actix_cors::Cors;
use actix_web::middleware::Condition;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

/// API server bound to the shared application state
pub struct ApiServer {
    app_state: crate::AppState,
}

/// Query-string parameters accepted by the products endpoint.
/// `product_id` arrives as a string so an unparseable value can be reported
/// as a client error instead of a routing miss.
#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    #[serde(default)]
    pub query: String,
    pub product_id: Option<String>,
}

impl ApiServer {
    /// Create new API server
    pub fn new(app_state: crate::AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server until the process shuts down
    pub async fn run(self) -> crate::errors::Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.app_state.config.server.host, self.app_state.config.server.port
        );
        let enable_cors = self.app_state.config.server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        let server = HttpServer::new(move || {
            App::new()
                .wrap(Condition::new(enable_cors, Cors::permissive()))
                .app_data(web::Data::new(self.app_state.clone()))
                .route("/products", web::get().to(products_handler))
                .route("/products/trending", web::get().to(trending_handler))
                .route("/best-sellers", web::get().to(best_sellers_handler))
                .route("/products/popular", web::get().to(popular_handler))
                .route("/health", web::get().to(health_handler))
        })
        .bind(&bind_addr)
        .map_err(|e| SearchError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();

        server.await.map_err(|e| SearchError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

/// Products endpoint: id lookup, free-text search, or the default listing
async fn products_handler(
    app_state: web::Data<crate::AppState>,
    params: web::Query<ProductsQuery>,
) -> ActixResult<HttpResponse> {
    info!(
        query = %params.query,
        product_id = ?params.product_id,
        "Received products request"
    );

    // Id lookup wins when both parameters are present. The id must parse
    // before any store call; a garbled id is the client's mistake.
    if let Some(raw_id) = params.product_id.as_deref().filter(|s| !s.is_empty()) {
        let product_id: u64 = match raw_id.parse() {
            Ok(id) => id,
            Err(_) => {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "ok": false,
                    "error": "Invalid product_id",
                })));
            }
        };

        return match app_state.query_engine.product_by_id(product_id).await {
            Ok(Some(product)) => Ok(HttpResponse::Ok().json(json!({
                "ok": true,
                "product": product,
            }))),
            Ok(None) => Ok(HttpResponse::NotFound().json(json!({
                "ok": false,
                "error": "Product not found",
            }))),
            Err(e) => Ok(internal_error("product lookup", &e)),
        };
    }

    if !params.query.is_empty() {
        return match app_state.query_engine.search(&params.query).await {
            Ok(products) => Ok(HttpResponse::Ok().json(json!({
                "ok": true,
                "products": products,
            }))),
            Err(e) => Ok(internal_error("text query", &e)),
        };
    }

    match app_state.query_engine.default_listing().await {
        Ok(products) => Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "products": products,
        }))),
        Err(e) => Ok(internal_error("default listing", &e)),
    }
}

async fn trending_handler(
    app_state: web::Data<crate::AppState>,
) -> ActixResult<HttpResponse> {
    ranked_handler(app_state, RankedListing::Trending).await
}

async fn best_sellers_handler(
    app_state: web::Data<crate::AppState>,
) -> ActixResult<HttpResponse> {
    ranked_handler(app_state, RankedListing::BestSellers).await
}

async fn popular_handler(
    app_state: web::Data<crate::AppState>,
) -> ActixResult<HttpResponse> {
    ranked_handler(app_state, RankedListing::Popular).await
}

/// Shared handler for the three ranked listings. An empty candidate pool is
/// an expected outcome reported inside a 200 envelope, not a transport error.
async fn ranked_handler(
    app_state: web::Data<crate::AppState>,
    listing: RankedListing,
) -> ActixResult<HttpResponse> {
    info!(listing = listing.label(), "Fetching ranked listing");

    match app_state.query_engine.ranked_listing(listing).await {
        Ok(products) if products.is_empty() => Ok(HttpResponse::Ok().json(json!({
            "ok": false,
            "error": "No products found",
        }))),
        Ok(products) => Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "products": products,
        }))),
        Err(e) => Ok(internal_error("ranked listing", &e)),
    }
}

/// Health endpoint: live connectivity probes plus the ingestion flag
async fn health_handler(app_state: web::Data<crate::AppState>) -> ActixResult<HttpResponse> {
    let store_status = match app_state.store.list_schemas().await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    let cache_status = match app_state.cache.ping().await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    Ok(HttpResponse::Ok().json(json!({
        "ok": store_status == "ok" && cache_status == "ok",
        "store_status": store_status,
        "cache_status": cache_status,
        "ingestion_complete": app_state.ingestion.is_complete(),
    })))
}

fn internal_error(operation: &str, e: &SearchError) -> HttpResponse {
    error!("Request failed during {}: {}", operation, e);
    HttpResponse::InternalServerError().json(json!({
        "ok": false,
        "error": e.to_string(),
    }))
}
