//! Prometheus metrics for catalog-service
//!
//! Counters register themselves with the default registry on first use;
//! `render` encodes everything gathered there, including cache metrics.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static PRODUCTS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "catalog_products_created_total",
        "Products persisted by the write path",
    )
    .expect("failed to create catalog_products_created_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register catalog_products_created_total");
    counter
});

static ENQUEUE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "catalog_enqueue_failures_total",
        "Products persisted whose image job could not be published",
    )
    .expect("failed to create catalog_enqueue_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register catalog_enqueue_failures_total");
    counter
});

static IMAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "catalog_images_total",
            "Per-image outcomes in the image worker",
        ),
        &["outcome", "stage"],
    )
    .expect("failed to create catalog_images_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register catalog_images_total");
    counter
});

static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("catalog_image_jobs_total", "Resolved image jobs"),
        &["resolution"],
    )
    .expect("failed to create catalog_image_jobs_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register catalog_image_jobs_total");
    counter
});

pub fn record_product_created() {
    PRODUCTS_CREATED_TOTAL.inc();
}

pub fn record_enqueue_failure() {
    ENQUEUE_FAILURES_TOTAL.inc();
}

pub fn record_image_stored() {
    IMAGES_TOTAL.with_label_values(&["stored", "storing"]).inc();
}

pub fn record_image_failed(stage: &str) {
    IMAGES_TOTAL.with_label_values(&["failed", stage]).inc();
}

pub fn record_job(resolution: &str) {
    JOBS_TOTAL.with_label_values(&[resolution]).inc();
}

/// Text exposition of the default registry
pub fn render() -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    let body = String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {e}")))?;
    Ok((encoder.format_type().to_string(), body))
}
