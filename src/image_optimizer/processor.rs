//! Image normalization
//!
//! Handles the actual transformation: classify → decode → orient → fit → encode.
//! Anything that does not need re-encoding is handed back byte-for-byte.

use bytes::Bytes;
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::num::NonZeroU32;

use super::config::ImageConfig;
use super::encoder::{EncoderQuality, ImageEncoder, WebPEncoder};
use super::error::ImageError;
use super::format::ImageKind;
use super::orientation::read_orientation;

/// Outcome of running an upload through the normalizer
#[derive(Debug, Clone)]
pub struct NormalizationResult {
    /// Bytes to forward (the original buffer when nothing was transformed)
    pub output_bytes: Bytes,
    /// MIME type to declare for `output_bytes`
    pub output_mime_type: String,
    /// Whether `output_bytes` were produced by the encoder
    pub was_transformed: bool,
    /// Oriented source dimensions, when the upload was decoded
    pub original_size: Option<(u32, u32)>,
    /// Dimensions of `output_bytes`, when the upload was decoded
    pub output_size: Option<(u32, u32)>,
}

impl NormalizationResult {
    fn passthrough(raw: Bytes, declared_mime_type: &str, size: Option<(u32, u32)>) -> Self {
        Self {
            output_bytes: raw,
            output_mime_type: declared_mime_type.to_string(),
            was_transformed: false,
            original_size: size,
            output_size: size,
        }
    }
}

/// Normalize an uploaded file.
///
/// # Arguments
/// * `raw` - The uploaded bytes
/// * `extension` - Lower-cased filename extension; decides whether the file is a candidate
/// * `declared_mime_type` - MIME type the client sent, reused on pass-through
/// * `config` - Bounding box and encoder settings
///
/// # Returns
/// * `Ok(NormalizationResult)` - Transcoded WebP, or the original bytes untouched
/// * `Err(ImageError)` - The file claims to be an image but cannot be processed
pub fn normalize(
    raw: Bytes,
    extension: &str,
    declared_mime_type: &str,
    config: &ImageConfig,
) -> Result<NormalizationResult, ImageError> {
    // 1. Only recognized extensions are candidates
    if ImageKind::from_extension(extension).is_none() {
        return Ok(NormalizationResult::passthrough(raw, declared_mime_type, None));
    }

    // 2. Decode and bake in the EXIF orientation
    let (img, detected) = decode_image(&raw, config)?;
    let img = read_orientation(&raw).apply(img);
    let has_alpha = img.color().has_alpha();

    // 3. Intrinsic size after orientation
    let src_width = img.width();
    let src_height = img.height();

    // 4. Orientation-aware bounding box
    let target = fit_inside(
        src_width,
        src_height,
        config.bounding_box(src_width, src_height),
    );

    // 5. Re-encode when the codec is not canonical or the pixels changed
    let is_canonical = ImageKind::from_image_format(detected)
        .map(|kind| kind.is_canonical())
        .unwrap_or(false);
    if is_canonical && target.is_none() {
        return Ok(NormalizationResult::passthrough(
            raw,
            declared_mime_type,
            Some((src_width, src_height)),
        ));
    }

    let processed = match target {
        Some((width, height)) => resize_image(&img, width, height)?,
        None => img,
    };
    let (out_width, out_height) = (processed.width(), processed.height());

    // 6. Encode to the canonical format
    let quality = EncoderQuality::with_quality(config.quality).with_effort(config.effort);
    let rgba_data = processed.to_rgba8().into_raw();
    let encoded = WebPEncoder.encode(&rgba_data, out_width, out_height, has_alpha, quality)?;

    Ok(NormalizationResult {
        output_bytes: Bytes::from(encoded.data),
        output_mime_type: encoded.content_type.to_string(),
        was_transformed: true,
        original_size: Some((src_width, src_height)),
        output_size: Some((out_width, out_height)),
    })
}

/// Largest size that fits inside `bounds` without enlarging, or `None` when
/// the source already fits.
pub fn fit_inside(width: u32, height: u32, bounds: (u32, u32)) -> Option<(u32, u32)> {
    let (max_width, max_height) = bounds;
    if width <= max_width && height <= max_height {
        return None;
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let target_width = ((width as f64 * scale).round() as u32).min(max_width).max(1);
    let target_height = ((height as f64 * scale).round() as u32).min(max_height).max(1);

    Some((target_width, target_height))
}

/// Decode image data, refusing image bombs before pixels are allocated
fn decode_image(
    data: &[u8],
    config: &ImageConfig,
) -> Result<(DynamicImage, ImageFormat), ImageError> {
    let format = detect_format(data)?;

    let (width, height) = ImageReader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?;
    validate_dimensions(width, height, config.max_source_pixels)?;

    let img = ImageReader::with_format(Cursor::new(data), format)
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?;

    Ok((img, format))
}

/// Detect the codec from the leading bytes.
///
/// AVIF is recognized from its ISO-BMFF `ftyp` brands first; the box size
/// varies by encoder, which fixed-prefix magic matching misses.
fn detect_format(data: &[u8]) -> Result<ImageFormat, ImageError> {
    if has_avif_brand(data) {
        return Ok(ImageFormat::Avif);
    }
    image::guess_format(data).map_err(|e| ImageError::decode_failed(e.to_string()))
}

fn has_avif_brand(data: &[u8]) -> bool {
    if data.len() < 16 || &data[4..8] != b"ftyp" {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let end = box_size.clamp(16, data.len());

    // Major brand, then compatible brands after the minor version
    let major = &data[8..12];
    let compatible = data[16..end].chunks_exact(4);
    std::iter::once(major)
        .chain(compatible)
        .any(|brand| brand == b"avif" || brand == b"avis")
}

/// Image bomb protection
fn validate_dimensions(width: u32, height: u32, max_pixels: u64) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::decode_failed("image has zero width or height"));
    }
    if width as u64 * height as u64 > max_pixels {
        return Err(ImageError::image_bomb(width, height, max_pixels));
    }
    Ok(())
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, ImageError> {
    let src_width =
        NonZeroU32::new(img.width()).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
