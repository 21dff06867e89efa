use super::{ProductStore, StoreResult};
use crate::models::{ImageStatus, NewProduct, Product, ProductFilter};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// In-process product store for local runs and tests
#[derive(Debug)]
pub struct InMemoryProductStore {
    products: DashMap<i64, Product>,
    next_id: AtomicI64,
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self {
            products: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Insert a fully-formed product, bypassing id assignment
    pub fn seed(&self, product: Product) {
        self.next_id.fetch_max(product.id + 1, Ordering::SeqCst);
        self.products.insert(product.id, product);
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Product {
            id,
            user_id: product.user_id,
            name: product.name,
            description: product.description,
            source_image_urls: product.source_image_urls,
            price: product.price,
            processed_image_urls: Vec::new(),
            image_status: product.image_status,
            created_at: Utc::now(),
        };
        self.products.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.products.get(&id).map(|p| p.clone()))
    }

    async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let mut matching: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|p| p.id);
        matching.truncate(filter.limit.max(0) as usize);
        Ok(matching)
    }

    async fn set_image_status(&self, id: i64, status: ImageStatus) -> StoreResult<()> {
        if let Some(mut product) = self.products.get_mut(&id) {
            product.image_status = status;
        }
        Ok(())
    }

    async fn append_processed_image(&self, id: i64, location: &str) -> StoreResult<bool> {
        match self.products.get_mut(&id) {
            Some(mut product) => {
                if product.processed_image_urls.iter().any(|u| u == location) {
                    return Ok(false);
                }
                product.processed_image_urls.push(location.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_image_status(
        &self,
        status: ImageStatus,
        limit: i64,
    ) -> StoreResult<Vec<Product>> {
        let mut matching: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| entry.image_status == status)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|p| p.id);
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(user_id: i64, price: f64) -> NewProduct {
        NewProduct {
            user_id,
            name: "chair".into(),
            description: "oak".into(),
            source_image_urls: vec![],
            price,
            image_status: ImageStatus::None,
        }
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let store = InMemoryProductStore::new();
        let a = store.insert(new_product(1, 5.0)).await.unwrap();
        let b = store.insert(new_product(1, 6.0)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let store = InMemoryProductStore::new();
        let p = store.insert(new_product(1, 5.0)).await.unwrap();

        assert!(store.append_processed_image(p.id, "s3://b/x.jpg").await.unwrap());
        assert!(!store.append_processed_image(p.id, "s3://b/x.jpg").await.unwrap());

        let stored = store.find_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_image_urls, vec!["s3://b/x.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let store = InMemoryProductStore::new();
        store.insert(new_product(1, 30.0)).await.unwrap();
        store.insert(new_product(2, 10.0)).await.unwrap();
        store.insert(new_product(1, 10.0)).await.unwrap();

        let filter = ProductFilter {
            user_id: Some(1),
            max_price: Some(30.0),
            ..Default::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].id < listed[1].id);
        assert!(listed.iter().all(|p| p.user_id == 1));
    }

    #[tokio::test]
    async fn test_seed_advances_id_counter() {
        let store = InMemoryProductStore::new();
        let mut product = store.insert(new_product(1, 1.0)).await.unwrap();
        product.id = 50;
        store.seed(product);

        let next = store.insert(new_product(1, 1.0)).await.unwrap();
        assert_eq!(next.id, 51);
    }
}
