//! Image processing pipeline
//!
//! Fetch source images, transform them and store the artifacts, driven by
//! jobs from the image queue.

pub mod consumer;
pub mod fetcher;
pub mod naming;
pub mod processor;
pub mod recovery;
pub mod sink;
pub mod worker;

pub use consumer::{ConsumerSettings, JobConsumer, JobResolution};
pub use fetcher::{FetchError, HttpImageFetcher, ImageFetcher};
pub use naming::{artifact_name, canonical_url};
pub use processor::{ImageProcessor, TransformConfig, TransformError, TransformedImage};
pub use recovery::RecoverySweep;
pub use sink::{build_s3_client, ImageSink, MemoryImageSink, PgBlobImageSink, S3ImageSink, SinkError};
pub use worker::{ImageOutcome, ImageStage, ImageWorker, JobReport};
