/// Configuration management for catalog-service
///
/// Loads configuration from environment variables with sensible defaults.
/// Unparseable numeric values fall back to their defaults; an unknown image
/// sink backend is rejected.
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub kafka: KafkaConfig,
    pub images: ImageConfig,
    pub sink: SinkConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    /// `None` keeps entries until evicted
    pub ttl_secs: Option<u64>,
    pub invalidate_on_write: bool,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub image_topic: String,
    pub dead_letter_topic: String,
    pub group_id: String,
    pub publish_max_retries: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageConfig {
    pub max_width: u32,
    pub jpeg_quality: u8,
    pub download_max_bytes: usize,
    pub max_redeliveries: u32,
    pub recovery_interval_secs: u64,
    pub recovery_batch_size: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    S3,
    Postgres,
}

impl FromStr for SinkBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(SinkBackend::S3),
            "postgres" | "postgresql" | "pg" => Ok(SinkBackend::Postgres),
            other => Err(ConfigError::Invalid {
                key: "IMAGE_SINK_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SinkConfig {
    pub backend: SinkBackend,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub key_prefix: Option<String>,
    pub public_base_url: Option<String>,
}

/// Per-collaborator call bounds
#[derive(Clone, Debug, Deserialize)]
pub struct TimeoutConfig {
    pub cache_ms: u64,
    pub database_ms: u64,
    pub broker_ms: u64,
    pub download_ms: u64,
    pub sink_ms: u64,
}

impl TimeoutConfig {
    pub fn cache(&self) -> Duration {
        Duration::from_millis(self.cache_ms)
    }

    pub fn database(&self) -> Duration {
        Duration::from_millis(self.database_ms)
    }

    pub fn broker(&self) -> Duration {
        Duration::from_millis(self.broker_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }

    pub fn sink(&self) -> Duration {
        Duration::from_millis(self.sink_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            cache_ms: resilience::presets::cache_store().timeout.duration.as_millis() as u64,
            database_ms: resilience::presets::relational_store()
                .timeout
                .duration
                .as_millis() as u64,
            broker_ms: resilience::presets::broker().timeout.duration.as_millis() as u64,
            download_ms: resilience::presets::image_download()
                .timeout
                .duration
                .as_millis() as u64,
            sink_ms: resilience::presets::image_sink().timeout.duration.as_millis() as u64,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TimeoutConfig::default();

        Ok(Config {
            app: AppConfig {
                host: env_or("CATALOG_SERVICE_HOST", "0.0.0.0"),
                port: env_parse("CATALOG_SERVICE_PORT", 8080),
                env: env_or("APP_ENV", "development"),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/catalog"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            },
            cache: CacheConfig {
                redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
                ttl_secs: Some(env_parse::<u64>("CACHE_TTL_SECS", 0)).filter(|secs| *secs > 0),
                invalidate_on_write: env_flag("CACHE_INVALIDATE_ON_WRITE"),
            },
            kafka: KafkaConfig {
                brokers: env_or("KAFKA_BROKERS", "localhost:9092"),
                image_topic: env_or("KAFKA_IMAGE_TOPIC", "image_queue"),
                dead_letter_topic: env_or("KAFKA_DEAD_LETTER_TOPIC", "image_queue.dlq"),
                group_id: env_or("KAFKA_GROUP_ID", "image-worker"),
                publish_max_retries: env_parse("PUBLISH_MAX_RETRIES", 2),
            },
            images: ImageConfig {
                max_width: env_parse("IMAGE_MAX_WIDTH", 800u32).max(1),
                jpeg_quality: env_parse("IMAGE_JPEG_QUALITY", 80u8).clamp(1, 100),
                download_max_bytes: env_parse("DOWNLOAD_MAX_BYTES", 20 * 1024 * 1024),
                max_redeliveries: env_parse("JOB_MAX_REDELIVERIES", 3),
                recovery_interval_secs: env_parse("RECOVERY_INTERVAL_SECS", 300),
                recovery_batch_size: env_parse("RECOVERY_BATCH_SIZE", 100),
            },
            sink: SinkConfig {
                backend: env_or("IMAGE_SINK_BACKEND", "s3").parse()?,
                s3_bucket: env_or("S3_BUCKET", "catalog-images"),
                s3_region: env_or("AWS_REGION", "us-east-1"),
                s3_endpoint: env_opt("S3_ENDPOINT"),
                s3_access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),
                key_prefix: env_opt("IMAGE_KEY_PREFIX"),
                public_base_url: env_opt("IMAGE_PUBLIC_BASE_URL"),
            },
            timeouts: TimeoutConfig {
                cache_ms: env_parse("CACHE_TIMEOUT_MS", defaults.cache_ms),
                database_ms: env_parse("DATABASE_TIMEOUT_MS", defaults.database_ms),
                broker_ms: env_parse("BROKER_TIMEOUT_MS", defaults.broker_ms),
                download_ms: env_parse("DOWNLOAD_TIMEOUT_MS", defaults.download_ms),
                sink_ms: env_parse("SINK_TIMEOUT_MS", defaults.sink_ms),
            },
        })
    }
}
