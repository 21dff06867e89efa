//! Image job consumer loop
//!
//! Receives jobs from the queue, runs them through the `ImageWorker` and
//! settles each delivery only after its outcome has been recorded: processed
//! locations appended, follow-up or dead letter published, image status set.
//! If recording fails the delivery is nacked and will be seen again.

use super::worker::{ImageWorker, JobReport};
use crate::cache::ProductCache;
use crate::db::ProductStore;
use crate::error::Result;
use crate::metrics;
use crate::models::{DeadLetter, ImageJob, ImageStatus};
use crate::queue::{Delivery, JobPublisher, JobSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Consumer behaviour knobs
#[derive(Clone, Debug)]
pub struct ConsumerSettings {
    /// Follow-up attempts allowed before failing URLs are dead-lettered
    pub max_redeliveries: u32,
    /// Drop `product:{id}` from the cache after recording an outcome
    pub invalidate_on_write: bool,
    /// Pause after a nack or receive error
    pub error_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            max_redeliveries: 3,
            invalidate_on_write: false,
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResolution {
    /// Every URL attempted; no follow-up needed
    Completed(ImageStatus),
    /// Retryable failures re-published as a follow-up job
    Requeued,
    /// Retryable failures with no redelivery budget left
    DeadLettered,
    /// Payload could not be decoded
    Poison,
}

impl JobResolution {
    fn label(&self) -> &'static str {
        match self {
            JobResolution::Completed(ImageStatus::Processed) => "processed",
            JobResolution::Completed(_) => "partially_processed",
            JobResolution::Requeued => "requeued",
            JobResolution::DeadLettered => "dead_lettered",
            JobResolution::Poison => "poison",
        }
    }
}

/// Long-lived consumer for the image queue
pub struct JobConsumer {
    source: Arc<dyn JobSource>,
    publisher: Arc<dyn JobPublisher>,
    products: Arc<dyn ProductStore>,
    cache: Option<ProductCache>,
    worker: Arc<ImageWorker>,
    settings: ConsumerSettings,
    shutdown_rx: watch::Receiver<bool>,
}

impl JobConsumer {
    pub fn new(
        source: Arc<dyn JobSource>,
        publisher: Arc<dyn JobPublisher>,
        products: Arc<dyn ProductStore>,
        worker: Arc<ImageWorker>,
        settings: ConsumerSettings,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            publisher,
            products,
            cache: None,
            worker,
            settings,
            shutdown_rx,
        }
    }

    pub fn with_cache(mut self, cache: ProductCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run the consumer loop until shutdown or until the source is exhausted
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting image job consumer loop");

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                received = self.source.receive() => {
                    match received {
                        Ok(Some(delivery)) => {
                            if let Err(e) = self.handle_delivery(&delivery).await {
                                error!(
                                    offset = delivery.offset,
                                    partition = delivery.partition,
                                    error = %e,
                                    "Image job delivery not settled"
                                );
                                tokio::time::sleep(self.settings.error_backoff).await;
                            }
                        }
                        Ok(None) => {
                            info!("Image queue drained");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "Image queue receive failed");
                            tokio::time::sleep(self.settings.error_backoff).await;
                        }
                    }
                }
            }
        }

        info!("Image job consumer stopped");
        Ok(())
    }

    /// Process one delivery and settle it
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Result<JobResolution> {
        let job = match ImageJob::decode(&delivery.payload) {
            Ok(job) => job,
            Err(e) => return self.park_poison(delivery, e.to_string()).await,
        };

        debug!(
            job_id = %job.job_id,
            product_id = ?job.product_id,
            attempt = job.attempt,
            urls = job.urls.len(),
            "Received image job"
        );

        let report = self.worker.process_job(&job).await;

        match self.record_outcome(&job, &report).await {
            Ok(resolution) => {
                // Outcome is already recorded; the broker may redeliver the job
                if let Err(e) = self.source.ack(delivery).await {
                    error!(
                        job_id = %job.job_id,
                        resolution = resolution.label(),
                        error = %e,
                        "Job outcome recorded but ack failed"
                    );
                    return Err(e.into());
                }
                metrics::record_job(resolution.label());
                info!(
                    job_id = %job.job_id,
                    product_id = ?job.product_id,
                    resolution = resolution.label(),
                    "Image job acknowledged"
                );
                Ok(resolution)
            }
            Err(e) => {
                warn!(
                    job_id = %job.job_id,
                    error = %e,
                    "Failed to record job outcome, returning delivery to queue"
                );
                if let Err(nack_err) = self.source.nack(delivery).await {
                    error!(job_id = %job.job_id, error = %nack_err, "Failed to nack delivery");
                }
                Err(e)
            }
        }
    }

    async fn park_poison(&self, delivery: &Delivery, reason: String) -> Result<JobResolution> {
        warn!(
            offset = delivery.offset,
            partition = delivery.partition,
            error = %reason,
            "Undecodable image job, dead-lettering"
        );

        let letter = DeadLetter::poison(&delivery.payload, reason);
        if let Err(e) = self.publisher.dead_letter(&letter).await {
            if let Err(nack_err) = self.source.nack(delivery).await {
                error!(error = %nack_err, "Failed to nack delivery");
            }
            return Err(e.into());
        }

        self.source.ack(delivery).await?;
        metrics::record_job(JobResolution::Poison.label());
        Ok(JobResolution::Poison)
    }

    async fn record_outcome(&self, job: &ImageJob, report: &JobReport) -> Result<JobResolution> {
        if let Some(product_id) = job.product_id {
            for location in report.stored_locations() {
                let added = self
                    .products
                    .append_processed_image(product_id, location)
                    .await?;
                if !added {
                    debug!(product_id, location = %location, "Processed image already recorded");
                }
            }
        }

        let (retryable, permanent) = report.failures();

        // Earlier attempts may already have lost URLs for good
        let any_permanent = !permanent.is_empty() || !job.permanent_failures.is_empty();

        let resolution = if retryable.is_empty() {
            JobResolution::Completed(if !any_permanent {
                ImageStatus::Processed
            } else {
                ImageStatus::PartiallyProcessed
            })
        } else if job.attempt < self.settings.max_redeliveries {
            let next = job.follow_up(
                retryable.iter().map(|f| f.url.clone()).collect(),
                &permanent,
            );
            self.publisher.publish(&next).await?;
            info!(
                job_id = %job.job_id,
                attempt = next.attempt,
                urls = next.urls.len(),
                "Re-published failed images"
            );
            JobResolution::Requeued
        } else {
            let letter = DeadLetter::exhausted(job, retryable);
            self.publisher.dead_letter(&letter).await?;
            warn!(
                job_id = %job.job_id,
                product_id = ?job.product_id,
                attempt = job.attempt,
                urls = letter.failures.len(),
                "Redelivery budget exhausted, images dead-lettered"
            );
            JobResolution::DeadLettered
        };

        if let Some(product_id) = job.product_id {
            let status = match resolution {
                JobResolution::Completed(status) => status,
                JobResolution::Requeued => ImageStatus::Pending,
                JobResolution::DeadLettered | JobResolution::Poison => ImageStatus::DeadLettered,
            };
            self.products.set_image_status(product_id, status).await?;
            self.invalidate(product_id).await;
        }

        Ok(resolution)
    }

    async fn invalidate(&self, product_id: i64) {
        if !self.settings.invalidate_on_write {
            return;
        }
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.invalidate_product(product_id).await {
                debug!(product_id, "product cache invalidation failed: {}", err);
            }
        }
    }
}
