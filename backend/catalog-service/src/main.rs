/// Catalog Service - HTTP Server
///
/// Serves product creation, cache-aside product reads and the filtered list.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use catalog_cache::{CacheMetrics, RedisStore};
use catalog_service::cache::ProductCache;
use catalog_service::db::PgProductStore;
use catalog_service::handlers;
use catalog_service::logging::init_tracing;
use catalog_service::queue::{KafkaJobPublisher, KafkaQueueConfig};
use catalog_service::services::{CatalogService, IngestionService};
use catalog_service::Config;
use resilience::RetryConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(&["catalog_service=info", "actix_web=info"]);

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    info!(env = %config.app.env, address = %bind_address, "Catalog service starting");

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.timeouts.database())
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;

    let products = Arc::new(PgProductStore::new(db_pool, config.timeouts.database()));

    if config.cache.ttl().is_none() {
        warn!("CACHE_TTL_SECS unset; cached products never expire and may serve stale data");
    }
    if let Err(e) = CacheMetrics::register(prometheus::default_registry()) {
        warn!(error = %e, "Failed to register cache metrics");
    }

    let mut catalog = CatalogService::new(products.clone());
    match RedisStore::connect(&config.cache.redis_url).await {
        Ok(store) => {
            catalog = catalog.with_cache(ProductCache::new(
                Arc::new(store),
                config.cache.ttl(),
                config.timeouts.cache(),
            ));
            info!(ttl_secs = ?config.cache.ttl_secs, "Product cache enabled");
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, serving product reads from the store only");
        }
    }

    let publisher = KafkaJobPublisher::new(&KafkaQueueConfig {
        brokers: config.kafka.brokers.clone(),
        topic: config.kafka.image_topic.clone(),
        dead_letter_topic: config.kafka.dead_letter_topic.clone(),
        group_id: config.kafka.group_id.clone(),
        call_timeout: config.timeouts.broker(),
    })
    .context("Failed to create Kafka producer")?;

    let publish_retry = RetryConfig {
        max_retries: config.kafka.publish_max_retries,
        ..resilience::presets::broker().retry_or_once()
    };
    let ingestion =
        IngestionService::new(products, Arc::new(publisher)).with_publish_retry(publish_retry);

    let catalog = web::Data::new(catalog);
    let ingestion = web::Data::new(ingestion);

    HttpServer::new(move || {
        App::new()
            .app_data(catalog.clone())
            .app_data(ingestion.clone())
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Catalog service shutting down");
    Ok(())
}
