//! Durable storage for transformed images
//!
//! Object storage and a relational blob table are interchangeable behind
//! `ImageSink`; the backend is chosen by configuration.

use crate::config::SinkConfig;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use dashmap::DashMap;
use resilience::timeout::{with_timeout_result, TimeoutError};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write timed out after {0:?}")]
    Timeout(Duration),

    #[error("sink backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Store `data` under `name`, replacing any previous object of that name
    async fn put(&self, name: &str, data: Bytes) -> Result<(), SinkError>;

    /// Location recorded on the product for an artifact name
    fn locate(&self, name: &str) -> String;
}

fn flatten<E: std::fmt::Display>(result: Result<(), TimeoutError<E>>) -> Result<(), SinkError> {
    result.map_err(|err| match err {
        TimeoutError::Elapsed(d) => SinkError::Timeout(d),
        TimeoutError::Failed(e) => SinkError::Backend(e.to_string()),
    })
}

/// Build an S3 client from sink configuration
///
/// Explicit credentials and a custom endpoint (MinIO and other S3-compatible
/// stores) are optional; otherwise the default provider chain is used.
pub async fn build_s3_client(config: &SinkConfig) -> Client {
    use aws_sdk_s3::config::Region;

    let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.s3_access_key_id, &config.s3_secret_access_key)
    {
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "catalog_image_sink",
        );
        aws_config_builder = aws_config_builder.credentials_provider(credentials);
    }

    if let Some(endpoint) = &config.s3_endpoint {
        aws_config_builder = aws_config_builder.endpoint_url(endpoint);
    }

    let aws_config = aws_config_builder.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    Client::from_conf(s3_config)
}

/// S3 object sink
#[derive(Clone)]
pub struct S3ImageSink {
    client: Client,
    bucket: String,
    key_prefix: Option<String>,
    public_base_url: Option<String>,
    timeout: Duration,
}

impl S3ImageSink {
    pub fn new(client: Client, config: &SinkConfig, timeout: Duration) -> Self {
        Self {
            client,
            bucket: config.s3_bucket.clone(),
            key_prefix: config
                .key_prefix
                .as_ref()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    fn object_key(&self, name: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.to_string(),
        }
    }
}

#[async_trait]
impl ImageSink for S3ImageSink {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), SinkError> {
        let key = self.object_key(name);
        let size = data.len();

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(JPEG_CONTENT_TYPE)
            .body(ByteStream::from(data))
            .send();

        flatten(
            with_timeout_result(self.timeout, async { request.await.map(|_| ()) }).await,
        )?;

        debug!(bucket = %self.bucket, key = %key, size, "Image stored in S3");
        Ok(())
    }

    fn locate(&self, name: &str) -> String {
        let key = self.object_key(name);
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("s3://{}/{}", self.bucket, key),
        }
    }
}

/// Relational blob sink (`product_image_blobs`)
#[derive(Clone)]
pub struct PgBlobImageSink {
    pool: PgPool,
    timeout: Duration,
}

impl PgBlobImageSink {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl ImageSink for PgBlobImageSink {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), SinkError> {
        let size = data.len();
        let query = sqlx::query(
            r#"
            INSERT INTO product_image_blobs (name, data, content_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET data = EXCLUDED.data, content_type = EXCLUDED.content_type, updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(data.to_vec())
        .bind(JPEG_CONTENT_TYPE);

        flatten(
            with_timeout_result(self.timeout, async {
                query.execute(&self.pool).await.map(|_| ())
            })
            .await,
        )?;

        debug!(name = %name, size, "Image stored in product_image_blobs");
        Ok(())
    }

    fn locate(&self, name: &str) -> String {
        format!("db://product_image_blobs/{name}")
    }
}

/// In-process sink for local runs and tests
#[derive(Debug, Default)]
pub struct MemoryImageSink {
    objects: DashMap<String, Bytes>,
}

impl MemoryImageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.objects.get(name).map(|b| b.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ImageSink for MemoryImageSink {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), SinkError> {
        self.objects.insert(name.to_string(), data);
        Ok(())
    }

    fn locate(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_overwrites() {
        let sink = MemoryImageSink::new();
        sink.put("a.jpg", Bytes::from_static(b"one")).await.unwrap();
        sink.put("a.jpg", Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get("a.jpg").unwrap(), Bytes::from_static(b"two"));
        assert_eq!(sink.locate("a.jpg"), "memory://a.jpg");
    }
}
