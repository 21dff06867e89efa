/// Product read operations
///
/// Single-product reads go through the cache: a well-formed hit is returned
/// without touching the relational store, anything else falls through to the
/// store and repopulates the cache. The cache is best-effort throughout; an
/// unreachable cache degrades to store-only reads.
use crate::cache::ProductCache;
use crate::db::ProductStore;
use crate::error::{AppError, Result};
use crate::models::{ListProductsQuery, Product, ProductFilter};
use catalog_cache::CacheLookup;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductStore>,
    cache: Option<ProductCache>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self {
            products,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ProductCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn cache(&self) -> Option<&ProductCache> {
        self.cache.as_ref()
    }

    /// Get a product by id
    pub async fn get_product(&self, product_id: i64) -> Result<Product> {
        if let Some(cache) = self.cache() {
            match cache.get_product(product_id).await {
                Ok(CacheLookup::Hit(product)) => return Ok(product),
                Ok(CacheLookup::Miss) => {}
                Ok(CacheLookup::Malformed) => {
                    debug!(product_id, "malformed product cache entry treated as miss");
                }
                Err(err) => {
                    warn!(product_id, "product cache read failed, using store: {}", err);
                }
            }
        }

        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

        if let Some(cache) = self.cache() {
            if let Err(err) = cache.cache_product(&product).await {
                debug!(product_id, "product cache set failed: {}", err);
            }
        }

        Ok(product)
    }

    /// Filtered list read; bypasses the cache
    pub async fn list_products(&self, query: ListProductsQuery) -> Result<Vec<Product>> {
        let filter = ProductFilter::try_from(query).map_err(AppError::Validation)?;
        let products = self.products.list(&filter).await?;
        Ok(products)
    }
}
