//! Upload format classification
//!
//! Whether an upload is a normalization candidate is decided by the file
//! extension the client supplied, not by sniffing magic bytes. Once an image
//! is decoded, the *detected* codec decides whether it is already canonical.

use image::ImageFormat;

/// Image formats the normalizer accepts, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
    Avif,
}

/// The single output encoding every transcoded image is converted to
pub const CANONICAL_FORMAT: ImageKind = ImageKind::WebP;

impl ImageKind {
    /// Map a lower-cased extension (without the dot) to an image kind.
    ///
    /// Recognized set is exactly {png, jpg, jpeg, webp, avif}.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Map a codec detected by the `image` crate
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Avif => Some(Self::Avif),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self == CANONICAL_FORMAT
    }
}

/// Lower-cased extension of a filename, without the leading dot.
///
/// Returns an empty string when the name has no extension. Dotfiles such as
/// `.bashrc` have no extension, matching `path.extname` semantics.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => base[idx + 1..].to_ascii_lowercase(),
    }
}
