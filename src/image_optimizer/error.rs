//! Image normalization error types
//!
//! Every variant aborts the upload before the backend is contacted; the
//! pipeline reports all of them as a processing failure (HTTP 500).

use std::fmt;

/// Errors that can occur while normalizing an uploaded image
#[derive(Debug, Clone)]
pub enum ImageError {
    // === Decoding Errors ===
    /// Failed to decode image data (corrupt, truncated or unsupported codec)
    DecodeFailed { message: String },

    // === Processing Errors ===
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to the canonical format failed
    EncodeFailed { format: String, message: String },

    // === Security Errors ===
    /// Image dimensions exceed safety limits (image bomb protection)
    ImageBombDetected {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::ImageBombDetected {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::DecodeFailed { .. } => "decode",
            ImageError::ResizeFailed { .. } => "resize",
            ImageError::EncodeFailed { .. } => "encode",
            ImageError::ImageBombDetected { .. } => "image_bomb",
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn image_bomb(width: u32, height: u32, max_pixels: u64) -> Self {
        ImageError::ImageBombDetected {
            width,
            height,
            pixels: width as u64 * height as u64,
            max_pixels,
        }
    }
}
