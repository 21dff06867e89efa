/// Integration tests for resilience library
use resilience::{
    presets,
    retry::{with_retry_if, RetryConfig, RetryError},
    timeout::{with_timeout_result, TimeoutError},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_timeout_inside_retry_counts_as_retryable_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let config = RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(5),
        jitter: false,
        ..Default::default()
    };

    let result = with_retry_if(
        config,
        move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                with_timeout_result(Duration::from_millis(20), async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                    Ok::<_, String>(n)
                })
                .await
            }
        },
        |e: &TimeoutError<String>| e.is_elapsed(),
    )
    .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_inner_failure_is_permanent_when_predicate_rejects_it() {
    let result = with_retry_if(
        RetryConfig::default(),
        || async {
            with_timeout_result(Duration::from_secs(1), async {
                Err::<(), _>("404 not found".to_string())
            })
            .await
        },
        |e: &TimeoutError<String>| e.is_elapsed(),
    )
    .await;

    match result {
        Err(RetryError::Permanent(TimeoutError::Failed(msg))) => assert!(msg.contains("404")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_presets_bound_calls() {
    let policy = presets::cache_store();
    let result = with_timeout_result(policy.timeout.duration, async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok::<_, String>(())
    })
    .await;

    assert!(result.unwrap_err().is_elapsed());
}
