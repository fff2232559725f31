//! # Image Preprocessor
//!
//! Best-effort recompression of seller-selected images before transfer.
//!
//! ## Overview
//!
//! Listing photos come straight off phone cameras and are routinely much
//! larger than the storefront needs. The preprocessor decodes the image,
//! downscales it to a bounding box, and re-encodes it as JPEG. Failure is
//! never surfaced to the caller: an image that cannot be decoded (or whose
//! re-encoding ends up larger than the original) is uploaded as-is.

use bytes::Bytes;
use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::entry::RawFile;

/// Preprocessor configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Bounding box for the longest image edge; larger images are downscaled
    pub max_dimension: u32,

    /// JPEG re-encoding quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            jpeg_quality: 85,
        }
    }
}

/// Best-effort image recompressor.
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a new preprocessor
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Produce the artifact to transfer for a raw file.
    ///
    /// Returns the recompressed bytes when recompression succeeded and
    /// actually shrank the file, otherwise the original bytes. Never fails.
    pub fn prepare(&self, raw: &RawFile) -> Bytes {
        match self.recompress(&raw.bytes) {
            Ok(out) if out.len() < raw.bytes.len() => {
                debug!(
                    file = %raw.name,
                    original_bytes = raw.bytes.len(),
                    recompressed_bytes = out.len(),
                    "Recompressed image"
                );
                out
            }
            Ok(out) => {
                debug!(
                    file = %raw.name,
                    original_bytes = raw.bytes.len(),
                    recompressed_bytes = out.len(),
                    "Recompression did not shrink image, keeping original"
                );
                raw.bytes.clone()
            }
            Err(err) => {
                warn!(
                    file = %raw.name,
                    content_type = %raw.content_type,
                    error = %err,
                    "Image recompression failed, uploading original"
                );
                raw.bytes.clone()
            }
        }
    }

    fn recompress(&self, bytes: &Bytes) -> Result<Bytes, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;

        let decoded = if decoded.width().max(decoded.height()) > self.config.max_dimension {
            decoded.resize(
                self.config.max_dimension,
                self.config.max_dimension,
                FilterType::Triangle,
            )
        } else {
            decoded
        };

        // JPEG has no alpha channel
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

        let mut out = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut out);
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut cursor,
            self.config.jpeg_quality,
        );
        rgb.write_with_encoder(encoder)?;

        Ok(Bytes::from(out))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}
