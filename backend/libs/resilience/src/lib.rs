/// Resilience helpers for calls that leave the process
///
/// Every call to an external collaborator (cache, relational store, broker,
/// image origin, image sink) goes through one of these wrappers:
/// - **Timeout**: bounds how long a single call may take
/// - **Retry**: exponential backoff with jitter for transient failures
/// - **Presets**: default timeout/retry pairs per collaborator kind
///
/// # Example: bounded store read
///
/// ```rust,no_run
/// use resilience::{presets, timeout::with_timeout_result};
///
/// #[tokio::main]
/// async fn main() {
///     let policy = presets::relational_store();
///
///     let result = with_timeout_result(policy.timeout.duration, async {
///         // Your database query
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

pub use presets::CallPolicy;
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, Elapsed, TimeoutConfig, TimeoutError};
