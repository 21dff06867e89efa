//! Shared fakes for catalog-service integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use catalog_cache::{CacheError, CacheResult, KeyValueStore};
use catalog_service::db::{InMemoryProductStore, ProductStore, StoreError, StoreResult};
use catalog_service::models::{DeadLetter, ImageJob, ImageStatus, NewProduct, Product, ProductFilter};
use catalog_service::queue::{JobPublisher, QueueError, QueueResult};
use catalog_service::services::images::{FetchError, ImageFetcher};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Encode a solid-colour PNG of the given size
pub fn png(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([12, 120, 200]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode test png");
    Bytes::from(buf)
}

pub fn new_product(user_id: i64, price: f64) -> NewProduct {
    NewProduct {
        user_id,
        name: format!("product of {user_id}"),
        description: "test product".to_string(),
        source_image_urls: vec![],
        price,
        image_status: ImageStatus::None,
    }
}

/// In-memory store that can be switched offline and counts lookups
#[derive(Default)]
pub struct SwitchableStore {
    inner: InMemoryProductStore,
    offline: AtomicBool,
    lookups: AtomicUsize,
}

impl SwitchableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductStore for SwitchableStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        self.check()?;
        self.inner.insert(product).await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Product>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        self.check()?;
        self.inner.list(filter).await
    }

    async fn set_image_status(&self, id: i64, status: ImageStatus) -> StoreResult<()> {
        self.check()?;
        self.inner.set_image_status(id, status).await
    }

    async fn append_processed_image(&self, id: i64, location: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.append_processed_image(id, location).await
    }

    async fn find_by_image_status(
        &self,
        status: ImageStatus,
        limit: i64,
    ) -> StoreResult<Vec<Product>> {
        self.check()?;
        self.inner.find_by_image_status(status, limit).await
    }
}

/// Cache backend that is always unreachable
pub struct BrokenCache;

#[async_trait]
impl KeyValueStore for BrokenCache {
    async fn get_raw(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_raw(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> CacheResult<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn del(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Broker that rejects every publish
#[derive(Default)]
pub struct FailingPublisher {
    attempts: AtomicUsize,
}

impl FailingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobPublisher for FailingPublisher {
    async fn publish(&self, _job: &ImageJob) -> QueueResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Rejected("broker unavailable".into()))
    }

    async fn dead_letter(&self, _letter: &DeadLetter) -> QueueResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Rejected("broker unavailable".into()))
    }
}

/// Canned origin response
#[derive(Clone)]
pub enum Origin {
    Body(Bytes),
    Status(u16),
    Timeout,
    /// Answers with the status on the first request, then serves the body
    FailOnce(u16, Bytes),
}

/// Fetcher serving canned responses; unknown URLs answer 404
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Origin>,
    failed_once: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, origin: Origin) -> Self {
        self.responses.insert(url.to_string(), origin);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(Origin::Body(bytes)) => Ok(bytes.clone()),
            Some(Origin::Status(code)) => Err(FetchError::Status(*code)),
            Some(Origin::Timeout) => Err(FetchError::Timeout(Duration::from_millis(10))),
            Some(Origin::FailOnce(code, bytes)) => {
                if self.failed_once.lock().unwrap().insert(url.to_string()) {
                    Err(FetchError::Status(*code))
                } else {
                    Ok(bytes.clone())
                }
            }
            None => Err(FetchError::Status(404)),
        }
    }
}
