//! EXIF orientation handling
//!
//! Cameras store pixels in sensor order and record the intended rotation in
//! the EXIF `Orientation` tag. Normalized output carries no EXIF block, so
//! the rotation has to be baked into the pixels before encoding.

use image::DynamicImage;
use std::io::Cursor;

/// The eight EXIF orientations (TIFF 6.0, tag 0x0112)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_exif_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    /// Bake the orientation into the pixel data
    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::FlipHorizontal => img.fliph(),
            Self::Rotate180 => img.rotate180(),
            Self::FlipVertical => img.flipv(),
            Self::Transpose => img.rotate90().fliph(),
            Self::Rotate90 => img.rotate90(),
            Self::Transverse => img.rotate270().fliph(),
            Self::Rotate270 => img.rotate270(),
        }
    }
}

/// Read the orientation tag from an encoded image.
///
/// Missing, unreadable or out-of-range tags are treated as `Normal`; a broken
/// EXIF block must never fail an otherwise decodable upload.
pub fn read_orientation(data: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(data);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return Orientation::Normal,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(Orientation::from_exif_value)
        .unwrap_or(Orientation::Normal)
}
