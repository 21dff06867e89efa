/// Relational store access for products
use crate::models::{ImageStatus, NewProduct, Product, ProductFilter};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod memory;
mod product_repo;

pub use memory::InMemoryProductStore;
pub use product_repo::PgProductStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Unreachable or slow store, as opposed to a rejected statement
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable product records
///
/// Implementations are shared across request tasks and the worker.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Persist a product in one write and return it with its assigned id
    async fn insert(&self, product: NewProduct) -> StoreResult<Product>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Product>>;

    /// Products matching `filter`, ordered by id
    async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    async fn set_image_status(&self, id: i64, status: ImageStatus) -> StoreResult<()>;

    /// Append a processed image location unless it is already recorded.
    ///
    /// Returns `true` when the location was added.
    async fn append_processed_image(&self, id: i64, location: &str) -> StoreResult<bool>;

    /// Oldest products currently in `status`
    async fn find_by_image_status(
        &self,
        status: ImageStatus,
        limit: i64,
    ) -> StoreResult<Vec<Product>>;
}
