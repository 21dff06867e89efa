/// Product snapshot caching
///
/// Thin typed layer over `catalog_cache::JsonCache` using the
/// `product:{id}` key schema.
use crate::models::Product;
use catalog_cache::{CacheKey, CacheLookup, CacheResult, JsonCache, SharedStore};
use std::time::Duration;

#[derive(Clone)]
pub struct ProductCache {
    inner: JsonCache,
}

impl ProductCache {
    pub fn new(store: SharedStore, ttl: Option<Duration>, call_timeout: Duration) -> Self {
        Self {
            inner: JsonCache::new(store, ttl).with_call_timeout(call_timeout),
        }
    }

    pub fn key(product_id: i64) -> String {
        CacheKey::product(product_id)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.inner.ttl()
    }

    pub async fn get_product(&self, product_id: i64) -> CacheResult<CacheLookup<Product>> {
        self.inner.get(&Self::key(product_id)).await
    }

    pub async fn cache_product(&self, product: &Product) -> CacheResult<()> {
        self.inner.set(&Self::key(product.id), product).await
    }

    pub async fn invalidate_product(&self, product_id: i64) -> CacheResult<()> {
        self.inner.invalidate(&Self::key(product_id)).await
    }
}
