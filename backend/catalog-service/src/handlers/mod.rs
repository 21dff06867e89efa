/// HTTP handlers for catalog endpoints
///
/// - Products: create, fetch by id, filtered list
/// - Health and metrics
pub mod products;

pub use products::{create_product, get_product, list_products};

use crate::error::AppError;
use crate::metrics;
use actix_web::{web, HttpResponse};

/// Register every route on an actix `ServiceConfig`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(health))
    .route("/health/ready", web::get().to(|| async { HttpResponse::Ok().finish() }))
    .route("/health/live", web::get().to(|| async { HttpResponse::Ok().finish() }))
    .route("/metrics", web::get().to(metrics_handler))
    .service(
        web::scope("/products")
            .route("", web::post().to(create_product))
            .route("", web::get().to(list_products))
            .route("/{id}", web::get().to(get_product)),
    );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

async fn metrics_handler() -> HttpResponse {
    match metrics::render() {
        Ok((content_type, body)) => HttpResponse::Ok().content_type(content_type).body(body),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}
