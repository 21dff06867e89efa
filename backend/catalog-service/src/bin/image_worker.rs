//! Image Worker - Kafka consumer for product image processing
//!
//! Consumes image jobs, stores transformed images in the configured sink and
//! records results on the product. A periodic sweep re-publishes jobs for
//! products whose enqueue failed at creation time.
//!
//! Environment variables (see `Config::from_env` for the full list):
//! - KAFKA_BROKERS / KAFKA_IMAGE_TOPIC / KAFKA_DEAD_LETTER_TOPIC / KAFKA_GROUP_ID
//! - IMAGE_SINK_BACKEND: `s3` or `postgres`
//! - IMAGE_MAX_WIDTH (default: 800), IMAGE_JPEG_QUALITY (default: 80)
//! - JOB_MAX_REDELIVERIES (default: 3)
//! - RECOVERY_INTERVAL_SECS (default: 300)

use anyhow::Context;
use catalog_cache::RedisStore;
use catalog_service::cache::ProductCache;
use catalog_service::config::SinkBackend;
use catalog_service::db::PgProductStore;
use catalog_service::logging::init_tracing;
use catalog_service::queue::{KafkaJobPublisher, KafkaJobSource, KafkaQueueConfig};
use catalog_service::services::images::{
    build_s3_client, ConsumerSettings, HttpImageFetcher, ImageProcessor, ImageSink, ImageWorker,
    JobConsumer, PgBlobImageSink, RecoverySweep, S3ImageSink, TransformConfig,
};
use catalog_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(&["image_worker=info", "catalog_service=info"]);

    info!("Starting Image Worker");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        kafka_brokers = %config.kafka.brokers,
        topic = %config.kafka.image_topic,
        sink = ?config.sink.backend,
        "Configuration loaded"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.timeouts.database())
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    let products = Arc::new(PgProductStore::new(
        db_pool.clone(),
        config.timeouts.database(),
    ));

    let sink: Arc<dyn ImageSink> = match config.sink.backend {
        SinkBackend::S3 => {
            let client = build_s3_client(&config.sink).await;
            Arc::new(S3ImageSink::new(client, &config.sink, config.timeouts.sink()))
        }
        SinkBackend::Postgres => Arc::new(PgBlobImageSink::new(db_pool, config.timeouts.sink())),
    };
    info!(backend = ?config.sink.backend, "Image sink initialized");

    let fetcher = HttpImageFetcher::new(config.timeouts.download(), config.images.download_max_bytes)
        .context("Failed to build HTTP client")?;
    let processor = Arc::new(ImageProcessor::new(TransformConfig {
        max_width: config.images.max_width,
        quality: config.images.jpeg_quality,
    }));
    let worker = Arc::new(ImageWorker::new(Arc::new(fetcher), processor, sink));

    let queue_config = KafkaQueueConfig {
        brokers: config.kafka.brokers.clone(),
        topic: config.kafka.image_topic.clone(),
        dead_letter_topic: config.kafka.dead_letter_topic.clone(),
        group_id: config.kafka.group_id.clone(),
        call_timeout: config.timeouts.broker(),
    };
    let publisher = Arc::new(
        KafkaJobPublisher::new(&queue_config).context("Failed to create Kafka producer")?,
    );
    let source =
        Arc::new(KafkaJobSource::new(&queue_config).context("Failed to create Kafka consumer")?);

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for ctrl+c"),
        }
        let _ = shutdown_tx_clone.send(true);
    });

    let settings = ConsumerSettings {
        max_redeliveries: config.images.max_redeliveries,
        invalidate_on_write: config.cache.invalidate_on_write,
        ..Default::default()
    };
    let mut consumer = JobConsumer::new(
        source,
        publisher.clone(),
        products.clone(),
        worker,
        settings,
        shutdown_rx.clone(),
    );

    if config.cache.invalidate_on_write {
        match RedisStore::connect(&config.cache.redis_url).await {
            Ok(store) => {
                consumer = consumer.with_cache(ProductCache::new(
                    Arc::new(store),
                    config.cache.ttl(),
                    config.timeouts.cache(),
                ));
                info!("Product cache invalidation enabled");
            }
            Err(e) => warn!(error = %e, "Redis unavailable, cache invalidation disabled"),
        }
    }

    // Spawn recovery sweep
    let sweep = RecoverySweep::new(products, publisher, config.images.recovery_batch_size);
    let mut sweep_shutdown_rx = shutdown_rx.clone();
    let sweep_interval = Duration::from_secs(config.images.recovery_interval_secs.max(1));

    let sweep_handle = tokio::spawn(async move {
        info!(
            interval_secs = sweep_interval.as_secs(),
            "Starting enqueue-failed recovery sweep"
        );

        let mut interval = tokio::time::interval(sweep_interval);

        loop {
            tokio::select! {
                _ = sweep_shutdown_rx.changed() => {
                    if *sweep_shutdown_rx.borrow() {
                        info!("Recovery sweep shutting down");
                        break;
                    }
                }
                _ = interval.tick() => {
                    match sweep.run_once().await {
                        Ok(count) => {
                            if count > 0 {
                                info!(recovered = count, "Recovery sweep completed");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Recovery sweep failed, will retry next interval");
                        }
                    }
                }
            }
        }
    });

    info!("Starting Kafka consumer loop");
    if let Err(e) = consumer.run().await {
        error!(error = %e, "Consumer error");
    }

    let _ = shutdown_tx.send(true);
    info!("Waiting for recovery sweep to finish");
    let _ = sweep_handle.await;

    info!("Image Worker stopped");
    Ok(())
}
