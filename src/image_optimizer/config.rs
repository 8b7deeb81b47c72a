use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_HEIGHT, DEFAULT_MAX_SOURCE_PIXELS, DEFAULT_MAX_WIDTH,
    DEFAULT_PROCESSING_TIMEOUT_SECS, DEFAULT_WEBP_EFFORT, DEFAULT_WEBP_QUALITY,
};

/// Normalization settings, injected once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Bounding box width for landscape images (height for portrait ones)
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Bounding box height for landscape images (width for portrait ones)
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// WebP quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// WebP effort / method (0-6)
    #[serde(default = "default_effort")]
    pub effort: u8,

    /// Refuse to decode sources above this many pixels
    #[serde(default = "default_max_source_pixels")]
    pub max_source_pixels: u64,

    /// Deadline for decode + resize + encode, in seconds
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_WEBP_QUALITY,
            effort: DEFAULT_WEBP_EFFORT,
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
            processing_timeout: DEFAULT_PROCESSING_TIMEOUT_SECS,
        }
    }
}

impl ImageConfig {
    /// Orientation-aware bounding box for a source of the given size.
    ///
    /// Landscape sources get `(max_width, max_height)`; square and portrait
    /// sources get the swapped pair, so the long edge of the box always lines
    /// up with the long edge of the image.
    pub fn bounding_box(&self, width: u32, height: u32) -> (u32, u32) {
        if width > height {
            (self.max_width, self.max_height)
        } else {
            (self.max_height, self.max_width)
        }
    }
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_quality() -> u8 {
    DEFAULT_WEBP_QUALITY
}

fn default_effort() -> u8 {
    DEFAULT_WEBP_EFFORT
}

fn default_max_source_pixels() -> u64 {
    DEFAULT_MAX_SOURCE_PIXELS
}

fn default_processing_timeout() -> u64 {
    DEFAULT_PROCESSING_TIMEOUT_SECS
}
