mod common;

use catalog_cache::{InMemoryStore, KeyValueStore};
use catalog_service::cache::ProductCache;
use catalog_service::db::ProductStore;
use catalog_service::services::CatalogService;
use catalog_service::AppError;
use common::{new_product, BrokenCache, SwitchableStore};
use std::sync::Arc;
use std::time::Duration;

fn cached_service(store: Arc<SwitchableStore>, kv: Arc<InMemoryStore>) -> CatalogService {
    CatalogService::new(store).with_cache(ProductCache::new(kv, None, Duration::from_millis(250)))
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let store = Arc::new(SwitchableStore::new());
    let service = cached_service(store, Arc::new(InMemoryStore::new()));

    let err = service.get_product(999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let store = Arc::new(SwitchableStore::new());
    let kv = Arc::new(InMemoryStore::new());
    let created = store.insert(new_product(7, 19.99)).await.unwrap();
    let service = cached_service(store.clone(), kv.clone());

    let first = service.get_product(created.id).await.unwrap();
    assert_eq!(first, created);
    assert!(kv.contains_key(&ProductCache::key(created.id)));

    store.set_offline(true);
    let lookups_before = store.lookups();

    let second = service.get_product(created.id).await.unwrap();
    assert_eq!(second, created);
    assert_eq!(store.lookups(), lookups_before);
}

#[tokio::test]
async fn test_malformed_cache_entry_falls_through_to_store() {
    let store = Arc::new(SwitchableStore::new());
    let kv = Arc::new(InMemoryStore::new());
    let created = store.insert(new_product(3, 5.0)).await.unwrap();
    kv.set_raw(&ProductCache::key(created.id), "{\"id\": \"oops\"".into(), None)
        .await
        .unwrap();
    let service = cached_service(store.clone(), kv.clone());

    let product = service.get_product(created.id).await.unwrap();
    assert_eq!(product, created);
    assert_eq!(store.lookups(), 1);

    // Repopulated with a well-formed snapshot
    let raw = kv
        .get_raw(&ProductCache::key(created.id))
        .await
        .unwrap()
        .unwrap();
    assert!(raw.contains(&format!("\"id\":{}", created.id)));
}

#[tokio::test]
async fn test_cache_outage_degrades_to_store() {
    let store = Arc::new(SwitchableStore::new());
    let created = store.insert(new_product(1, 1.0)).await.unwrap();
    let service = CatalogService::new(store.clone()).with_cache(ProductCache::new(
        Arc::new(BrokenCache),
        None,
        Duration::from_millis(250),
    ));

    let product = service.get_product(created.id).await.unwrap();
    assert_eq!(product, created);
}

#[tokio::test]
async fn test_store_outage_is_transient_not_not_found() {
    let store = Arc::new(SwitchableStore::new());
    let created = store.insert(new_product(1, 1.0)).await.unwrap();
    store.set_offline(true);
    let service = cached_service(store, Arc::new(InMemoryStore::new()));

    let err = service.get_product(created.id).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_cached_snapshot_can_be_stale() {
    let store = Arc::new(SwitchableStore::new());
    let kv = Arc::new(InMemoryStore::new());
    let created = store.insert(new_product(1, 1.0)).await.unwrap();
    let service = cached_service(store.clone(), kv);

    service.get_product(created.id).await.unwrap();
    store
        .append_processed_image(created.id, "memory://late.jpg")
        .await
        .unwrap();

    let cached = service.get_product(created.id).await.unwrap();
    assert!(cached.processed_image_urls.is_empty());
}

#[tokio::test]
async fn test_reads_without_cache() {
    let store = Arc::new(SwitchableStore::new());
    let created = store.insert(new_product(2, 2.0)).await.unwrap();
    let service = CatalogService::new(store.clone());

    service.get_product(created.id).await.unwrap();
    service.get_product(created.id).await.unwrap();
    assert_eq!(store.lookups(), 2);
}
