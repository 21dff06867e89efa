/// Data models for catalog-service
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

mod jobs;

pub use jobs::{DeadLetter, FailedImage, ImageJob};

/// Where a product's images are in the processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Product was created without images
    #[default]
    None,
    /// Job published; worker has not resolved it yet
    Pending,
    /// Product persisted but the job never reached the broker
    EnqueueFailed,
    Processed,
    PartiallyProcessed,
    DeadLettered,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::None => "none",
            ImageStatus::Pending => "pending",
            ImageStatus::EnqueueFailed => "enqueue_failed",
            ImageStatus::Processed => "processed",
            ImageStatus::PartiallyProcessed => "partially_processed",
            ImageStatus::DeadLettered => "dead_lettered",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ImageStatus::None),
            "pending" => Ok(ImageStatus::Pending),
            "enqueue_failed" => Ok(ImageStatus::EnqueueFailed),
            "processed" => Ok(ImageStatus::Processed),
            "partially_processed" => Ok(ImageStatus::PartiallyProcessed),
            "dead_lettered" => Ok(ImageStatus::DeadLettered),
            other => Err(format!("unknown image status: {other}")),
        }
    }
}

impl TryFrom<String> for ImageStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Product entity
///
/// `processed_image_urls` is only ever appended to, by the image worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub source_image_urls: Vec<String>,
    pub price: f64,
    #[serde(default)]
    pub processed_image_urls: Vec<String>,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub image_status: ImageStatus,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a single durable insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub source_image_urls: Vec<String>,
    pub price: f64,
    pub image_status: ImageStatus,
}

/// Create product request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub user_id: i64,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_image_urls: Vec<String>,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
}

/// Create product response
///
/// `images_scheduled = false` with a non-empty image list means the product
/// exists but its images were not handed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProductResponse {
    pub product_id: i64,
    pub image_status: ImageStatus,
    pub images_scheduled: bool,
}

/// Query string of the list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductsQuery {
    pub user_id: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: Option<i64>,
}

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

/// Store-level filter; price bounds are inclusive
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter {
    pub user_id: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: i64,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            min_price: None,
            max_price: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        self.user_id.map_or(true, |id| product.user_id == id)
            && self.min_price.map_or(true, |min| product.price >= min)
            && self.max_price.map_or(true, |max| product.price <= max)
    }
}

impl TryFrom<ListProductsQuery> for ProductFilter {
    type Error = String;

    fn try_from(query: ListProductsQuery) -> Result<Self, Self::Error> {
        for (label, bound) in [("min_price", query.min_price), ("max_price", query.max_price)] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("{label} must be a non-negative number"));
                }
            }
        }

        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err("min_price must not exceed max_price".to_string());
            }
        }

        let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {MAX_LIST_LIMIT}"));
        }

        Ok(ProductFilter {
            user_id: query.user_id,
            min_price: query.min_price,
            max_price: query.max_price,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(price: f64, name: &str) -> CreateProductRequest {
        CreateProductRequest {
            user_id: 1,
            name: name.to_string(),
            description: String::new(),
            source_image_urls: vec![],
            price,
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(request(0.0, "lamp").validate().is_ok());
        assert!(request(-0.01, "lamp").validate().is_err());
        assert!(request(10.0, "").validate().is_err());
    }

    #[test]
    fn test_image_status_round_trip() {
        for status in [
            ImageStatus::None,
            ImageStatus::Pending,
            ImageStatus::EnqueueFailed,
            ImageStatus::Processed,
            ImageStatus::PartiallyProcessed,
            ImageStatus::DeadLettered,
        ] {
            assert_eq!(status.as_str().parse::<ImageStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
        assert!("queued".parse::<ImageStatus>().is_err());
    }

    #[test]
    fn test_filter_rejects_inverted_bounds() {
        let query = ListProductsQuery {
            min_price: Some(20.0),
            max_price: Some(10.0),
            ..Default::default()
        };
        assert!(ProductFilter::try_from(query).is_err());
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let filter = ProductFilter {
            min_price: Some(10.0),
            max_price: Some(20.0),
            ..Default::default()
        };
        let mut product = Product {
            id: 1,
            user_id: 7,
            name: "lamp".into(),
            description: String::new(),
            source_image_urls: vec![],
            price: 10.0,
            processed_image_urls: vec![],
            image_status: ImageStatus::None,
            created_at: Utc::now(),
        };
        assert!(filter.matches(&product));
        product.price = 20.0;
        assert!(filter.matches(&product));
        product.price = 20.5;
        assert!(!filter.matches(&product));
    }
}
