//! Per-job image processing
//!
//! Each URL runs through `Downloading -> Transforming -> Storing`
//! independently and in submission order. A failure at any stage is recorded
//! for that URL only; the remaining URLs are still attempted.

use super::fetcher::ImageFetcher;
use super::naming::artifact_name;
use super::processor::ImageProcessor;
use super::sink::ImageSink;
use crate::metrics;
use crate::models::{FailedImage, ImageJob};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stage an image was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Downloading,
    Transforming,
    Storing,
}

impl ImageStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStage::Downloading => "downloading",
            ImageStage::Transforming => "transforming",
            ImageStage::Storing => "storing",
        }
    }
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Stored {
        url: String,
        name: String,
        location: String,
    },
    Failed {
        url: String,
        stage: ImageStage,
        reason: String,
        retryable: bool,
    },
}

impl ImageOutcome {
    fn failed(url: &str, stage: ImageStage, reason: String, retryable: bool) -> Self {
        ImageOutcome::Failed {
            url: url.to_string(),
            stage,
            reason,
            retryable,
        }
    }
}

/// What happened to every URL of one job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: Uuid,
    pub product_id: Option<i64>,
    pub outcomes: Vec<ImageOutcome>,
}

impl JobReport {
    /// Locations of stored artifacts, in job order
    pub fn stored_locations(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ImageOutcome::Stored { location, .. } => Some(location.as_str()),
                ImageOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn stored_count(&self) -> usize {
        self.stored_locations().len()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.stored_count()
    }

    /// Failures split into (retryable, permanent)
    pub fn failures(&self) -> (Vec<FailedImage>, Vec<FailedImage>) {
        let mut retryable = Vec::new();
        let mut permanent = Vec::new();

        for outcome in &self.outcomes {
            if let ImageOutcome::Failed {
                url,
                stage,
                reason,
                retryable: can_retry,
            } = outcome
            {
                let failed = FailedImage {
                    url: url.clone(),
                    stage: stage.to_string(),
                    reason: reason.clone(),
                };
                if *can_retry {
                    retryable.push(failed);
                } else {
                    permanent.push(failed);
                }
            }
        }

        (retryable, permanent)
    }
}

/// Fetch, transform and store every image of a job
pub struct ImageWorker {
    fetcher: Arc<dyn ImageFetcher>,
    processor: Arc<ImageProcessor>,
    sink: Arc<dyn ImageSink>,
}

impl ImageWorker {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        processor: Arc<ImageProcessor>,
        sink: Arc<dyn ImageSink>,
    ) -> Self {
        Self {
            fetcher,
            processor,
            sink,
        }
    }

    pub async fn process_job(&self, job: &ImageJob) -> JobReport {
        let mut outcomes = Vec::with_capacity(job.urls.len());

        for url in &job.urls {
            let outcome = self.process_image(url).await;
            match &outcome {
                ImageOutcome::Stored { location, .. } => {
                    metrics::record_image_stored();
                    debug!(job_id = %job.job_id, url = %url, location = %location, "Image stored");
                }
                ImageOutcome::Failed {
                    stage,
                    reason,
                    retryable,
                    ..
                } => {
                    metrics::record_image_failed(stage.as_str());
                    warn!(
                        job_id = %job.job_id,
                        product_id = ?job.product_id,
                        url = %url,
                        stage = %stage,
                        retryable,
                        error = %reason,
                        "Image processing failed"
                    );
                }
            }
            outcomes.push(outcome);
        }

        let report = JobReport {
            job_id: job.job_id,
            product_id: job.product_id,
            outcomes,
        };

        info!(
            job_id = %job.job_id,
            product_id = ?job.product_id,
            attempt = job.attempt,
            stored = report.stored_count(),
            failed = report.failure_count(),
            "Image job processed"
        );

        report
    }

    async fn process_image(&self, url: &str) -> ImageOutcome {
        let original = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return ImageOutcome::failed(
                    url,
                    ImageStage::Downloading,
                    err.to_string(),
                    err.is_retryable(),
                );
            }
        };

        // Decode failures will not change on retry
        let transformed = match self.processor.clone().transform_async(original).await {
            Ok(image) => image,
            Err(err) => {
                return ImageOutcome::failed(url, ImageStage::Transforming, err.to_string(), false);
            }
        };

        let name = artifact_name(url);
        if let Err(err) = self.sink.put(&name, transformed.data).await {
            return ImageOutcome::failed(url, ImageStage::Storing, err.to_string(), true);
        }

        ImageOutcome::Stored {
            url: url.to_string(),
            location: self.sink.locate(&name),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_splits_failures() {
        let report = JobReport {
            job_id: Uuid::new_v4(),
            product_id: Some(1),
            outcomes: vec![
                ImageOutcome::Stored {
                    url: "http://x/a.jpg".into(),
                    name: "a".into(),
                    location: "memory://a".into(),
                },
                ImageOutcome::failed("http://x/b.jpg", ImageStage::Downloading, "HTTP 503".into(), true),
                ImageOutcome::failed("http://x/c.jpg", ImageStage::Transforming, "decode".into(), false),
            ],
        };

        assert_eq!(report.stored_locations(), vec!["memory://a"]);
        assert_eq!(report.failure_count(), 2);

        let (retryable, permanent) = report.failures();
        assert_eq!(retryable.len(), 1);
        assert_eq!(retryable[0].url, "http://x/b.jpg");
        assert_eq!(retryable[0].stage, "downloading");
        assert_eq!(permanent.len(), 1);
        assert_eq!(permanent[0].stage, "transforming");
    }
}
