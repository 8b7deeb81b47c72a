//! Image encoder abstraction
//!
//! The normalizer only ever writes the canonical format, but encoding stays
//! behind a trait so the codec can be swapped without touching the decision
//! logic in the processor.

use super::error::ImageError;
use super::format::ImageKind;

/// Quality settings for image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderQuality {
    /// Quality value (1-100, where 100 is best quality)
    pub quality: u8,
    /// Effort/speed trade-off (0-6 for WebP, where 6 is slowest/best compression)
    pub effort: u8,
}

impl Default for EncoderQuality {
    fn default() -> Self {
        Self {
            quality: 80,
            effort: 4,
        }
    }
}

impl EncoderQuality {
    /// Create quality settings with specified quality level
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            ..Default::default()
        }
    }

    /// Set the encoding effort (speed vs compression trade-off)
    pub fn with_effort(mut self, effort: u8) -> Self {
        self.effort = effort.min(6);
        self
    }
}

/// Result of encoding an image
#[derive(Debug)]
pub struct EncodedImage {
    /// The encoded image data
    pub data: Vec<u8>,
    /// Content-Type header value
    pub content_type: &'static str,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>, format: ImageKind) -> Self {
        Self {
            data,
            content_type: format.content_type(),
        }
    }
}

/// Trait for image encoders
pub trait ImageEncoder: Send + Sync {
    /// Encode raw RGBA image data (4 bytes per pixel).
    ///
    /// `has_alpha` lets the encoder drop a fully opaque alpha channel.
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        has_alpha: bool,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError>;
}

/// Lossy WebP encoder backed by libwebp.
///
/// Output is deterministic for identical pixels and settings.
#[derive(Debug, Default)]
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        has_alpha: bool,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ImageError::encode_failed(
                "webp",
                format!("expected {} RGBA bytes, got {}", expected, data.len()),
            ));
        }

        let mut config = webp::WebPConfig::new()
            .map_err(|_| ImageError::encode_failed("webp", "invalid encoder configuration"))?;
        config.lossless = 0;
        config.quality = quality.quality as f32;
        config.method = quality.effort as i32;
        config.alpha_quality = 100;
        // Photo tuning (libwebp's PHOTO preset)
        config.sns_strength = 80;
        config.filter_sharpness = 3;
        config.filter_strength = 30;

        let result = if has_alpha {
            webp::Encoder::from_rgba(data, width, height).encode_advanced(&config)
        } else {
            let rgb = rgba_to_rgb(data);
            webp::Encoder::from_rgb(&rgb, width, height).encode_advanced(&config)
        };
        let memory =
            result.map_err(|e| ImageError::encode_failed("webp", format!("{:?}", e)))?;

        Ok(EncodedImage::new(memory.to_vec(), ImageKind::WebP))
    }
}

/// Convert RGBA to RGB by discarding alpha channel
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let pixel_count = rgba.len() / 4;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }

    rgb
}
