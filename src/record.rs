//! # Record Normalizer Module
//!
//! ## Purpose
//! Maps one raw, heterogeneous catalog record (a decoded JSON line) into the
//! fixed, typed [`ProductRecord`] that the store indexes and the cache serves.
//!
//! ## Input/Output Specification
//! - **Input**: `serde_json::Value` decoded from a feed line, plus the
//!   caller-assigned product id (1-based position in the ingestion stream)
//! - **Output**: `ProductRecord` or a hard error for malformed numeric fields
//! - **Determinism**: the same raw input always yields the same record
//!
//! ## Key Features
//! - Sentinel values (`-1.0` / `-1`) for absent rating and price data, so
//!   "rated 0" stays distinguishable from "no rating data"
//! - List-or-scalar description flattening (joined with single spaces)
//! - Main-image extraction with CDN prefix stripping

use crate::errors::{Result, SearchError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed CDN prefix stripped from the main image URL
pub const IMAGE_URL_PREFIX: &str = "https://m.media-amazon.com/images/I/";

/// Sentinel for an absent average rating
pub const RATING_UNKNOWN: f64 = -1.0;
/// Sentinel for an absent rating count
pub const RATING_COUNT_UNKNOWN: i64 = -1;
/// Sentinel for an absent price
pub const PRICE_UNKNOWN: f64 = -1.0;

/// One product as stored and cached. The store is the source of truth;
/// cached copies are disposable projections of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Unique, dense, 1-based id assigned at ingestion time
    pub product_id: u64,
    pub title: String,
    pub store: String,
    /// Free-form description, flattened to a single string
    pub description: String,
    /// Ordered feature bullets, insertion order preserved
    pub features: Vec<String>,
    /// Average rating; `-1.0` means unknown
    pub average_rating: f64,
    /// Number of ratings; `-1` means unknown
    pub rating_number: i64,
    /// Price; `-1.0` means unknown
    pub price: f64,
    /// Details mapping serialized to compact JSON text (indexed as text)
    pub details: String,
    /// High-resolution image for the "main" variant, CDN prefix stripped
    pub main_hi_res_image: String,
}

/// Normalize one raw catalog record. Pure and stateless; the caller supplies
/// the product id (the record's 1-based ordinal in the feed).
pub fn normalize_record(raw: &Value, product_id: u64) -> Result<ProductRecord> {
    Ok(ProductRecord {
        product_id,
        title: string_field(raw, "title"),
        store: string_field(raw, "store"),
        description: flatten_description(raw.get("description"))?,
        features: string_sequence(raw.get("features"))?,
        average_rating: float_field(raw.get("average_rating"), RATING_UNKNOWN)?,
        rating_number: int_field(raw.get("rating_number"), RATING_COUNT_UNKNOWN)?,
        price: float_field(raw.get("price"), PRICE_UNKNOWN)?,
        details: details_field(raw.get("details"))?,
        main_hi_res_image: main_image(raw.get("images")),
    })
}

fn string_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// A list joins with single spaces; a scalar passes through; absent is empty.
fn flatten_description(value: Option<&Value>) -> Result<String> {
    match value {
        Some(Value::Array(items)) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let part = item.as_str().ok_or_else(|| SearchError::DataParsing {
                    origin: "description".to_string(),
                    details: "non-string element in description list".to_string(),
                })?;
                parts.push(part);
            }
            Ok(parts.join(" "))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Ok(String::new()),
        Some(other) => Err(SearchError::DataParsing {
            origin: "description".to_string(),
            details: format!("unexpected type: {}", other),
        }),
    }
}

fn string_sequence(value: Option<&Value>) -> Result<Vec<String>> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    SearchError::DataParsing {
                        origin: "features".to_string(),
                        details: "non-string element in features list".to_string(),
                    }
                })
            })
            .collect(),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(SearchError::DataParsing {
            origin: "features".to_string(),
            details: format!("unexpected type: {}", other),
        }),
    }
}

/// Parse a numeric field to f64. Absent or null resolves to the sentinel;
/// a present non-numeric value is a hard error, never silently skipped.
fn float_field(value: Option<&Value>, sentinel: f64) -> Result<f64> {
    match value {
        Some(Value::Null) | None => Ok(sentinel),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| SearchError::DataParsing {
            origin: "numeric field".to_string(),
            details: format!("value out of range: {}", n),
        }),
        Some(Value::String(s)) => s.parse::<f64>().map_err(|_| SearchError::DataParsing {
            origin: "numeric field".to_string(),
            details: format!("not a number: {:?}", s),
        }),
        Some(other) => Err(SearchError::DataParsing {
            origin: "numeric field".to_string(),
            details: format!("unexpected type: {}", other),
        }),
    }
}

fn int_field(value: Option<&Value>, sentinel: i64) -> Result<i64> {
    match value {
        Some(Value::Null) | None => Ok(sentinel),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                // Fractional counts truncate toward zero
                Ok(f as i64)
            } else {
                Err(SearchError::DataParsing {
                    origin: "integer field".to_string(),
                    details: format!("value out of range: {}", n),
                })
            }
        }
        Some(Value::String(s)) => s.parse::<i64>().map_err(|_| SearchError::DataParsing {
            origin: "integer field".to_string(),
            details: format!("not an integer: {:?}", s),
        }),
        Some(other) => Err(SearchError::DataParsing {
            origin: "integer field".to_string(),
            details: format!("unexpected type: {}", other),
        }),
    }
}

/// Details are stored as opaque JSON text, not structured data; the store
/// indexes the serialized form.
fn details_field(value: Option<&Value>) -> Result<String> {
    match value {
        Some(v) => Ok(serde_json::to_string(v)?),
        None => Ok("{}".to_string()),
    }
}

/// First image whose `variant` (case-insensitive) is "main", taking its
/// `hi_res` URL with exactly one occurrence of the CDN prefix stripped.
/// A missing or non-list `images` field yields an empty string.
fn main_image(value: Option<&Value>) -> String {
    let images = match value {
        Some(Value::Array(items)) => items,
        _ => return String::new(),
    };

    for image in images {
        let variant = image.get("variant").and_then(Value::as_str).unwrap_or("");
        if variant.eq_ignore_ascii_case("main") {
            let hi_res = image.get("hi_res").and_then(Value::as_str).unwrap_or("");
            return hi_res
                .strip_prefix(IMAGE_URL_PREFIX)
                .unwrap_or(hi_res)
                .to_string();
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_optional_fields_resolve_to_sentinels() {
        let raw = json!({"title": "Plain Shirt"});
        let record = normalize_record(&raw, 7).unwrap();
        assert_eq!(record.product_id, 7);
        assert_eq!(record.average_rating, RATING_UNKNOWN);
        assert_eq!(record.rating_number, RATING_COUNT_UNKNOWN);
        assert_eq!(record.price, PRICE_UNKNOWN);
        assert_eq!(record.description, "");
        assert!(record.features.is_empty());
        assert_eq!(record.details, "{}");
        assert_eq!(record.main_hi_res_image, "");
    }

    #[test]
    fn null_rating_is_sentinel_not_zero() {
        let raw = json!({"average_rating": null, "rating_number": null});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.average_rating, -1.0);
        assert_eq!(record.rating_number, -1);
    }

    #[test]
    fn description_list_joins_with_single_spaces() {
        let raw = json!({"description": ["Soft", "breathable", "cotton"]});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.description, "Soft breathable cotton");
    }

    #[test]
    fn description_scalar_passes_through() {
        let raw = json!({"description": "As-is text"});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.description, "As-is text");
    }

    #[test]
    fn numeric_strings_parse() {
        let raw = json!({"average_rating": "4.2", "rating_number": "17", "price": "9.99"});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.average_rating, 4.2);
        assert_eq!(record.rating_number, 17);
        assert_eq!(record.price, 9.99);
    }

    #[test]
    fn non_numeric_rating_is_a_hard_error() {
        let raw = json!({"average_rating": "four and a half"});
        assert!(normalize_record(&raw, 1).is_err());
    }

    #[test]
    fn main_image_variant_match_is_case_insensitive() {
        let raw = json!({"images": [
            {"variant": "THUMB", "hi_res": "https://m.media-amazon.com/images/I/thumb.jpg"},
            {"variant": "MAIN", "hi_res": "https://m.media-amazon.com/images/I/abc.jpg"},
        ]});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.main_hi_res_image, "abc.jpg");
    }

    #[test]
    fn main_image_strips_prefix_once() {
        // Prefix embedded later in the URL must survive
        let url = format!("{}{}x.jpg", IMAGE_URL_PREFIX, IMAGE_URL_PREFIX);
        let raw = json!({"images": [{"variant": "main", "hi_res": url}]});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.main_hi_res_image, format!("{}x.jpg", IMAGE_URL_PREFIX));
    }

    #[test]
    fn main_image_null_hi_res_is_empty() {
        let raw = json!({"images": [{"variant": "main", "hi_res": null}]});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.main_hi_res_image, "");
    }

    #[test]
    fn non_list_images_treated_as_empty() {
        let raw = json!({"images": "none"});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.main_hi_res_image, "");
    }

    #[test]
    fn details_serialize_to_compact_json() {
        let raw = json!({"details": {"Material": "Cotton"}});
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.details, r#"{"Material":"Cotton"}"#);
    }

    #[test]
    fn red_scarf_scenario() {
        let raw = json!({
            "title": "Red Scarf",
            "average_rating": 4.5,
            "images": [{"variant": "MAIN", "hi_res": "https://m.media-amazon.com/images/I/abc.jpg"}]
        });
        let record = normalize_record(&raw, 1).unwrap();
        assert_eq!(record.product_id, 1);
        assert_eq!(record.title, "Red Scarf");
        assert_eq!(record.average_rating, 4.5);
        assert_eq!(record.main_hi_res_image, "abc.jpg");
        assert_eq!(record.rating_number, -1);
        assert!(record.features.is_empty());
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = json!({
            "title": "Hat",
            "description": ["a", "b"],
            "details": {"k": "v"},
            "price": 12.0
        });
        let first = normalize_record(&raw, 3).unwrap();
        let second = normalize_record(&raw, 3).unwrap();
        assert_eq!(first, second);
    }
}
