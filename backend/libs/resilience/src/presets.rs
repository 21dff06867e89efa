/// Preset call policies for each kind of external collaborator
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Timeout plus optional retry for one collaborator kind
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: TimeoutConfig,
    pub retry: Option<RetryConfig>,
}

impl CallPolicy {
    /// Same policy with a different per-call timeout.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout.duration = duration;
        self
    }

    /// Retry configuration, or a single attempt when the preset has none.
    pub fn retry_or_once(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_else(RetryConfig::none)
    }
}

/// Key-value cache (Redis)
///
/// - Timeout: 250ms (a slow cache is treated as an absent cache)
/// - No retry: the caller degrades to the relational store instead
pub fn cache_store() -> CallPolicy {
    CallPolicy {
        timeout: TimeoutConfig {
            duration: Duration::from_millis(250),
        },
        retry: None,
    }
}

/// Relational store (PostgreSQL)
///
/// - Timeout: 5s
/// - No retry: inserts are not idempotent
pub fn relational_store() -> CallPolicy {
    CallPolicy {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        retry: None,
    }
}

/// Broker publish/consume (Kafka)
///
/// - Timeout: 5s
/// - Retry: 2 attempts; duplicates are tolerated downstream
pub fn broker() -> CallPolicy {
    CallPolicy {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        retry: Some(RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: true,
        }),
    }
}

/// Source image download over HTTP
///
/// - Timeout: 15s
/// - No in-call retry: failed downloads go back through the queue
pub fn image_download() -> CallPolicy {
    CallPolicy {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(15),
        },
        retry: None,
    }
}

/// Image sink writes (object store or blob column)
///
/// - Timeout: 30s
/// - Retry: 2 attempts; writes are idempotent under deterministic names
pub fn image_sink() -> CallPolicy {
    CallPolicy {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(30),
        },
        retry: Some(RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }),
    }
}
