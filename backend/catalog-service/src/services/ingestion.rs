/// Product creation
///
/// Persists a validated product in one write, then hands its images to the
/// broker. The insert is never rolled back: a publish that still fails after
/// retries leaves the product in `enqueue_failed`, which the recovery sweep
/// picks up later.
use crate::db::ProductStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    CreateProductRequest, CreateProductResponse, ImageJob, ImageStatus, NewProduct,
};
use crate::queue::JobPublisher;
use resilience::retry::{with_retry, RetryConfig};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;
use validator::Validate;

#[derive(Clone)]
pub struct IngestionService {
    products: Arc<dyn ProductStore>,
    publisher: Arc<dyn JobPublisher>,
    publish_retry: RetryConfig,
}

impl IngestionService {
    pub fn new(products: Arc<dyn ProductStore>, publisher: Arc<dyn JobPublisher>) -> Self {
        Self {
            products,
            publisher,
            publish_retry: resilience::presets::broker().retry_or_once(),
        }
    }

    pub fn with_publish_retry(mut self, retry: RetryConfig) -> Self {
        self.publish_retry = retry;
        self
    }

    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<CreateProductResponse> {
        let new_product = validate_request(request)?;
        let has_images = !new_product.source_image_urls.is_empty();

        let product = self.products.insert(new_product).await?;
        metrics::record_product_created();
        info!(
            product_id = product.id,
            user_id = product.user_id,
            images = product.source_image_urls.len(),
            "Product created"
        );

        if !has_images {
            return Ok(CreateProductResponse {
                product_id: product.id,
                image_status: ImageStatus::None,
                images_scheduled: false,
            });
        }

        let job = ImageJob::new(product.id, product.source_image_urls.clone());
        let publisher = self.publisher.clone();
        let published = with_retry(self.publish_retry.clone(), || {
            let publisher = publisher.clone();
            let job = job.clone();
            async move { publisher.publish(&job).await }
        })
        .await;

        match published {
            Ok(()) => {
                info!(product_id = product.id, job_id = %job.job_id, "Image job published");
                Ok(CreateProductResponse {
                    product_id: product.id,
                    image_status: ImageStatus::Pending,
                    images_scheduled: true,
                })
            }
            Err(err) => {
                metrics::record_enqueue_failure();
                warn!(
                    product_id = product.id,
                    job_id = %job.job_id,
                    error = %err,
                    "Image job publish failed, product left unscheduled"
                );

                if let Err(status_err) = self
                    .products
                    .set_image_status(product.id, ImageStatus::EnqueueFailed)
                    .await
                {
                    error!(
                        product_id = product.id,
                        error = %status_err,
                        "Failed to mark product enqueue_failed"
                    );
                }

                Ok(CreateProductResponse {
                    product_id: product.id,
                    image_status: ImageStatus::EnqueueFailed,
                    images_scheduled: false,
                })
            }
        }
    }
}

/// Check the request and turn it into an insert
///
/// Nothing is written when this fails.
pub fn validate_request(request: CreateProductRequest) -> Result<NewProduct> {
    request.validate()?;

    if !request.price.is_finite() {
        return Err(AppError::Validation("price must be a finite number".into()));
    }

    for raw in &request.source_image_urls {
        let url = Url::parse(raw)
            .map_err(|e| AppError::Validation(format!("invalid image URL {raw:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AppError::Validation(format!(
                "image URL {raw:?} must be an absolute http(s) URL"
            )));
        }
    }

    let image_status = if request.source_image_urls.is_empty() {
        ImageStatus::None
    } else {
        ImageStatus::Pending
    };

    Ok(NewProduct {
        user_id: request.user_id,
        name: request.name,
        description: request.description,
        source_image_urls: request.source_image_urls,
        price: request.price,
        image_status,
    })
}
