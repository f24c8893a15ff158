//! Image recompression engine.

use crate::CompressionOutcome;
use bytes::Bytes;
use formvault_core::CompressionConfig;
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

const JPEG_MIME: &str = "image/jpeg";
const PNG_MIME: &str = "image/png";

/// True when the declared MIME type names an image.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Fit `width`x`height` inside `max_width`x`max_height`, preserving aspect ratio.
///
/// Images already inside the bounds keep their size; nothing is upscaled.
///
/// ```
/// use formvault_compress::target_dimensions;
///
/// assert_eq!(target_dimensions(2000, 1500, 1920, 1080), (1440, 1080));
/// assert_eq!(target_dimensions(800, 600, 1920, 1080), (800, 600));
/// ```
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);

    if scale >= 1.0 {
        return (width, height);
    }

    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (
        scaled(width).min(max_width),
        scaled(height).min(max_height),
    )
}

/// Deterministic image recompression.
///
/// Identical input bytes and configuration always produce identical output
/// bytes. A re-encode that is not strictly smaller than the input is discarded.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use formvault_compress::CompressionEngine;
/// use formvault_core::CompressionConfig;
///
/// let engine = CompressionEngine::new(CompressionConfig::default());
/// let outcome = engine.compress(&Bytes::from_static(b"plain text"), "text/plain");
///
/// assert!(*outcome.skipped());
/// assert_eq!(outcome.data().as_ref(), b"plain text");
/// ```
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    config: CompressionConfig,
}

impl CompressionEngine {
    /// Create an engine with the given bounds and quality.
    pub fn new(config: CompressionConfig) -> Self {
        tracing::debug!(
            enabled = config.enabled(),
            max_width = config.max_width(),
            max_height = config.max_height(),
            quality = config.quality(),
            "Creating compression engine"
        );
        Self { config }
    }

    /// Engine configuration.
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compress `data` declared as `mime_type`.
    ///
    /// Never fails: decode and encode errors are logged and the original bytes
    /// are returned with `skipped` set.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub fn compress(&self, data: &Bytes, mime_type: &str) -> CompressionOutcome {
        let is_image = is_image_mime(mime_type);

        if !is_image || !*self.config.enabled() {
            tracing::debug!(is_image, "Compression not applicable, passing through");
            return Self::passthrough(data, mime_type, is_image, None);
        }

        let decoded = match Self::decode(data, mime_type) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, "Image decode failed, storing original bytes");
                return Self::passthrough(data, mime_type, is_image, None);
            }
        };

        let (width, height) = decoded.dimensions();
        let (target_width, target_height) = target_dimensions(
            width,
            height,
            *self.config.max_width(),
            *self.config.max_height(),
        );

        let resized = if (target_width, target_height) == (width, height) {
            decoded
        } else {
            decoded.resize_exact(target_width, target_height, FilterType::Triangle)
        };

        let (encoded, encoded_mime) = match self.encode(&resized, mime_type) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Image encode failed, storing original bytes");
                return Self::passthrough(data, mime_type, is_image, Some((width, height)));
            }
        };

        if encoded.len() >= data.len() {
            tracing::debug!(
                original = data.len(),
                encoded = encoded.len(),
                "Re-encode not smaller, keeping original"
            );
            return CompressionOutcome {
                data: data.clone(),
                mime_type: mime_type.to_string(),
                original_size: data.len() as u64,
                is_image,
                applied: false,
                skipped: false,
                width: Some(width),
                height: Some(height),
            };
        }

        tracing::debug!(
            original = data.len(),
            stored = encoded.len(),
            width = target_width,
            height = target_height,
            "Compressed image"
        );

        CompressionOutcome {
            data: Bytes::from(encoded),
            mime_type: encoded_mime.to_string(),
            original_size: data.len() as u64,
            is_image,
            applied: true,
            skipped: false,
            width: Some(target_width),
            height: Some(target_height),
        }
    }

    fn passthrough(
        data: &Bytes,
        mime_type: &str,
        is_image: bool,
        dimensions: Option<(u32, u32)>,
    ) -> CompressionOutcome {
        CompressionOutcome {
            data: data.clone(),
            mime_type: mime_type.to_string(),
            original_size: data.len() as u64,
            is_image,
            applied: false,
            skipped: true,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        }
    }

    fn decode(data: &[u8], mime_type: &str) -> StorageResult<DynamicImage> {
        let decoded = match ImageFormat::from_mime_type(mime_type.trim()) {
            Some(format) => image::load_from_memory_with_format(data, format),
            None => image::load_from_memory(data),
        };

        decoded.map_err(|e| StorageError::new(StorageErrorKind::CompressionFailed(e.to_string())))
    }

    /// PNG stays PNG; everything else becomes baseline JPEG at the configured quality.
    fn encode(
        &self,
        image: &DynamicImage,
        mime_type: &str,
    ) -> StorageResult<(Vec<u8>, &'static str)> {
        let mut buf = Vec::new();
        let to_error =
            |e: image::ImageError| StorageError::new(StorageErrorKind::CompressionFailed(e.to_string()));

        if mime_type.trim().eq_ignore_ascii_case(PNG_MIME) {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            image.write_with_encoder(encoder).map_err(to_error)?;
            return Ok((buf, PNG_MIME));
        }

        let rgb = image.to_rgb8();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, *self.config.quality());
            encoder.encode_image(&rgb).map_err(to_error)?;
        }
        Ok((buf, JPEG_MIME))
    }
}
