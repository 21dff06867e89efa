//! Image transform - decodes a source image, caps its width and re-encodes it as JPEG
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode JPEG: {0}")]
    Encode(String),

    #[error("transform task failed: {0}")]
    Task(String),
}

/// Configuration for the transform
#[derive(Clone, Debug)]
pub struct TransformConfig {
    /// Maximum output width in pixels; height follows the aspect ratio
    pub max_width: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            quality: 80,
        }
    }
}

/// Result of a transform
#[derive(Debug)]
pub struct TransformedImage {
    /// The image data as JPEG
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Image processor
pub struct ImageProcessor {
    config: TransformConfig,
}

impl ImageProcessor {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(TransformConfig::default())
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Transform the given image data (blocking version)
    ///
    /// **Note:** CPU-bound; async callers should use `transform_async`.
    pub fn transform(&self, original: &[u8]) -> Result<TransformedImage, TransformError> {
        let img = image::load_from_memory(original)
            .map_err(|e| TransformError::Decode(e.to_string()))?;

        let (orig_w, orig_h) = img.dimensions();
        let (new_w, new_h) = self.target_dimensions(orig_w, orig_h);

        let resized = if (new_w, new_h) == (orig_w, orig_h) {
            debug!(width = orig_w, height = orig_h, "Image within max width, encoding as-is");
            img
        } else {
            img.resize_exact(new_w, new_h, FilterType::Lanczos3)
        };

        let data = self.encode_jpeg(resized)?;

        debug!(
            original_width = orig_w,
            original_height = orig_h,
            width = new_w,
            height = new_h,
            size = data.len(),
            "Image transformed"
        );

        Ok(TransformedImage {
            data,
            width: new_w,
            height: new_h,
        })
    }

    /// Transform on the blocking thread pool
    pub async fn transform_async(
        self: Arc<Self>,
        original: Bytes,
    ) -> Result<TransformedImage, TransformError> {
        tokio::task::spawn_blocking(move || self.transform(&original))
            .await
            .map_err(|e| TransformError::Task(e.to_string()))?
    }

    /// Output dimensions: width capped at `max_width`, never upscaled
    fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let max_w = self.config.max_width;
        if width <= max_w {
            return (width, height);
        }

        let ratio = max_w as f64 / width as f64;
        let scaled_h = ((height as f64) * ratio).round() as u32;
        (max_w, scaled_h.max(1))
    }

    fn encode_jpeg(&self, img: DynamicImage) -> Result<Bytes, TransformError> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.into_rgb8());

        let mut buf = Vec::new();
        rgb.write_to(
            &mut Cursor::new(&mut buf),
            ImageOutputFormat::Jpeg(self.config.quality),
        )
        .map_err(|e| TransformError::Encode(e.to_string()))?;

        Ok(Bytes::from(buf))
    }
}
