// Image normalization unit tests
// Exercises the public normalize() API with generated images

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use immich_resize_proxy::image_optimizer::{
    extension_of, fit_inside, normalize, ImageConfig, ImageError,
};
use rstest::rstest;
use std::io::Cursor;

fn small_box() -> ImageConfig {
    ImageConfig {
        max_width: 64,
        max_height: 36,
        quality: 80,
        effort: 0,
        ..ImageConfig::default()
    }
}

fn encode(img: DynamicImage, format: ImageFormat) -> Bytes {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    Bytes::from(buffer.into_inner())
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    }))
}

/// JPEG carrying an EXIF orientation tag (big-endian TIFF, single IFD entry)
fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Bytes {
    let jpeg = encode(gradient(width, height), ImageFormat::Jpeg);

    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    app1.extend_from_slice(&[0x00, 0x01]);
    app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    Bytes::from(out)
}

fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

#[rstest]
#[case(4000, 3000, (2560, 1440), Some((1920, 1440)))]
#[case(3000, 4000, (1440, 2560), Some((1440, 1920)))]
#[case(2000, 1000, (2560, 1440), None)]
#[case(2560, 1440, (2560, 1440), None)]
#[case(10000, 10, (2560, 1440), Some((2560, 3)))]
#[case(1, 5000, (1440, 2560), Some((1, 2560)))]
fn test_fit_inside(
    #[case] width: u32,
    #[case] height: u32,
    #[case] bounds: (u32, u32),
    #[case] expected: Option<(u32, u32)>,
) {
    assert_eq!(fit_inside(width, height, bounds), expected);
}

#[test]
fn test_bounding_box_follows_orientation() {
    let config = ImageConfig::default();
    assert_eq!(config.bounding_box(4000, 3000), (2560, 1440));
    assert_eq!(config.bounding_box(3000, 4000), (1440, 2560));
    // Square sources use the portrait box
    assert_eq!(config.bounding_box(3000, 3000), (1440, 2560));
}

#[rstest]
#[case("IMG_0001.JPG", "jpg")]
#[case("archive.tar.gz", "gz")]
#[case("no_extension", "")]
#[case(".hidden", "")]
#[case("dir.v2/photo", "")]
fn test_extension_of(#[case] filename: &str, #[case] expected: &str) {
    assert_eq!(extension_of(filename), expected);
}

#[test]
fn test_landscape_jpeg_is_shrunk_to_box() {
    let raw = encode(gradient(640, 480), ImageFormat::Jpeg);
    let result = normalize(raw, "jpg", "image/jpeg", &small_box()).unwrap();

    assert!(result.was_transformed);
    assert_eq!(result.output_mime_type, "image/webp");
    assert_eq!(result.original_size, Some((640, 480)));
    assert_eq!(result.output_size, Some((48, 36)));
    assert_eq!(dimensions(&result.output_bytes), (48, 36));
}

#[test]
fn test_exif_rotation_is_applied_before_fitting() {
    // Stored landscape, displayed portrait (orientation 6 = rotate 90 CW)
    let raw = jpeg_with_orientation(400, 200, 6);
    let result = normalize(raw, "jpeg", "image/jpeg", &small_box()).unwrap();

    assert_eq!(result.original_size, Some((200, 400)));
    assert_eq!(dimensions(&result.output_bytes), (32, 64));
}

#[test]
fn test_never_upscales() {
    let raw = encode(gradient(20, 10), ImageFormat::Png);
    let result = normalize(raw, "png", "image/png", &small_box()).unwrap();

    assert!(result.was_transformed);
    assert_eq!(dimensions(&result.output_bytes), (20, 10));
}

#[test]
fn test_alpha_survives_transcode() {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(16, 16, |x, _| {
        image::Rgba([255, 0, 0, if x < 8 { 0 } else { 255 }])
    }));
    let raw = encode(img, ImageFormat::Png);
    let result = normalize(raw, "png", "image/png", &small_box()).unwrap();

    assert!(result.was_transformed);
    assert!(result.output_bytes.windows(4).any(|w| w == b"ALPH"));
}

#[test]
fn test_normalization_is_idempotent() {
    let raw = encode(gradient(300, 200), ImageFormat::Jpeg);
    let config = small_box();

    let first = normalize(raw, "jpg", "image/jpeg", &config).unwrap();
    let second = normalize(
        first.output_bytes.clone(),
        "webp",
        &first.output_mime_type,
        &config,
    )
    .unwrap();

    assert!(!second.was_transformed);
    assert_eq!(second.output_bytes, first.output_bytes);
}

/// Real AVIF file, 8-bit so every AV1 decoder build accepts it
fn avif(width: u32, height: u32) -> Bytes {
    let pixels: Vec<ravif::RGBA8> = (0..width * height)
        .map(|i| ravif::RGBA8::new((i % width * 4) as u8, (i / width * 4) as u8, 160, 255))
        .collect();
    let encoded = ravif::Encoder::new()
        .with_quality(80.0)
        .with_speed(10)
        .with_depth(Some(8))
        .encode_rgba(ravif::Img::new(pixels.as_slice(), width as usize, height as usize))
        .unwrap();
    Bytes::from(encoded.avif_file)
}

#[test]
fn test_avif_is_transcoded() {
    let result = normalize(avif(48, 32), "avif", "image/avif", &small_box()).unwrap();

    assert!(result.was_transformed);
    assert_eq!(result.output_mime_type, "image/webp");
    assert_eq!(result.original_size, Some((48, 32)));
    assert_eq!(&result.output_bytes[8..12], b"WEBP");
    assert_eq!(dimensions(&result.output_bytes), (48, 32));
}

#[test]
fn test_large_avif_is_shrunk_to_box() {
    let result = normalize(avif(128, 96), "AVIF", "image/avif", &small_box()).unwrap();

    assert!(result.was_transformed);
    assert_eq!(result.output_mime_type, "image/webp");
    assert_eq!(dimensions(&result.output_bytes), (48, 36));
}

#[test]
fn test_misnamed_file_is_detected_by_content() {
    // PNG bytes under a .webp name still get transcoded
    let raw = encode(gradient(12, 12), ImageFormat::Png);
    let result = normalize(raw, "webp", "image/webp", &small_box()).unwrap();

    assert!(result.was_transformed);
    assert_eq!(&result.output_bytes[8..12], b"WEBP");
}

#[rstest]
#[case("mp4", "video/mp4")]
#[case("heic", "image/heic")]
#[case("", "application/octet-stream")]
fn test_unrecognized_extensions_pass_through(#[case] extension: &str, #[case] mime: &str) {
    let raw = Bytes::from_static(b"\x00\x00\x00\x18ftypmp42 arbitrary payload");
    let result = normalize(raw.clone(), extension, mime, &small_box()).unwrap();

    assert!(!result.was_transformed);
    assert_eq!(result.output_bytes, raw);
    assert_eq!(result.output_mime_type, mime);
    assert_eq!(result.original_size, None);
}

#[test]
fn test_truncated_image_is_an_error() {
    let raw = encode(gradient(64, 64), ImageFormat::Png);
    let truncated = raw.slice(..raw.len() / 2);

    let result = normalize(truncated, "png", "image/png", &small_box());
    assert!(matches!(result, Err(ImageError::DecodeFailed { .. })));
}

#[test]
fn test_image_bomb_is_refused_before_decode() {
    let config = ImageConfig {
        max_source_pixels: 100,
        ..small_box()
    };
    let raw = encode(gradient(20, 20), ImageFormat::Png);

    let err = normalize(raw, "png", "image/png", &config).unwrap_err();
    assert_eq!(err.kind(), "image_bomb");
}
