//! Re-publishes image jobs for products whose enqueue failed at creation

use crate::db::ProductStore;
use crate::error::Result;
use crate::models::{ImageJob, ImageStatus};
use crate::queue::JobPublisher;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RecoverySweep {
    products: Arc<dyn ProductStore>,
    publisher: Arc<dyn JobPublisher>,
    batch_size: i64,
}

impl RecoverySweep {
    pub fn new(
        products: Arc<dyn ProductStore>,
        publisher: Arc<dyn JobPublisher>,
        batch_size: i64,
    ) -> Self {
        Self {
            products,
            publisher,
            batch_size: batch_size.max(1),
        }
    }

    /// One pass over `enqueue_failed` products; returns how many were re-published
    ///
    /// A product is flipped to `pending` before its job is published so a
    /// fast worker cannot have its final status overwritten.
    pub async fn run_once(&self) -> Result<usize> {
        let stranded = self
            .products
            .find_by_image_status(ImageStatus::EnqueueFailed, self.batch_size)
            .await?;

        if stranded.is_empty() {
            debug!("No enqueue-failed products to recover");
            return Ok(0);
        }

        let mut recovered = 0;
        for product in stranded {
            if product.source_image_urls.is_empty() {
                self.products
                    .set_image_status(product.id, ImageStatus::None)
                    .await?;
                continue;
            }

            self.products
                .set_image_status(product.id, ImageStatus::Pending)
                .await?;

            let job = ImageJob::new(product.id, product.source_image_urls.clone());
            match self.publisher.publish(&job).await {
                Ok(()) => {
                    recovered += 1;
                    info!(product_id = product.id, job_id = %job.job_id, "Recovered image job");
                }
                Err(e) => {
                    warn!(product_id = product.id, error = %e, "Recovery publish failed");
                    self.products
                        .set_image_status(product.id, ImageStatus::EnqueueFailed)
                        .await?;
                }
            }
        }

        Ok(recovered)
    }
}
