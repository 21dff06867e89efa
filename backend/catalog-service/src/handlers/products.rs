/// Product handlers - HTTP endpoints for product operations
use actix_web::{web, HttpResponse};

use crate::error::{AppError, Result};
use crate::models::{CreateProductRequest, ListProductsQuery};
use crate::services::{CatalogService, IngestionService};

/// Create a product and schedule its images
pub async fn create_product(
    ingestion: web::Data<IngestionService>,
    req: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    let response = ingestion.create_product(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Get a specific product
pub async fn get_product(
    catalog: web::Data<CatalogService>,
    product_id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = product_id
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid product ID".to_string()))?;

    let product = catalog.get_product(id).await?;
    Ok(HttpResponse::Ok().json(product))
}

/// List products, optionally filtered by owner and price range
pub async fn list_products(
    catalog: web::Data<CatalogService>,
    query: web::Query<ListProductsQuery>,
) -> Result<HttpResponse> {
    let products = catalog.list_products(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(products))
}
