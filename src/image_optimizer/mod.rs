//! Image normalization module
//!
//! Converts uploaded photos to a single canonical encoding:
//! - EXIF orientation is baked into the pixels
//! - Images larger than the orientation-aware bounding box are shrunk (never enlarged)
//! - Anything not already WebP, or anything resized, is re-encoded as lossy WebP
//!
//! Files with an unrecognized extension, and WebP files that already fit,
//! are handed back byte-for-byte.

pub mod config;
pub mod encoder;
pub mod error;
pub mod format;
pub mod orientation;
pub mod processor;

pub use config::ImageConfig;
pub use encoder::{EncodedImage, EncoderQuality, ImageEncoder, WebPEncoder};
pub use error::ImageError;
pub use format::{extension_of, ImageKind, CANONICAL_FORMAT};
pub use orientation::{read_orientation, Orientation};
pub use processor::{fit_inside, normalize, NormalizationResult};
