//! Still-image decoding for uploads and captures.

use std::io::Cursor;

use image::DynamicImage;
use tracing::debug;

use super::types::PixelBuffer;
use super::FrameError;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
pub const MIN_IMAGE_BYTES: usize = 67;

/// Decode a full still image into an RGB `PixelBuffer`.
///
/// Phone photos store rotation in EXIF tag 0x0112; it is applied here so the
/// classifier sees the leaf the way the farmer framed it.
pub fn decode_still_image(bytes: &[u8]) -> Result<PixelBuffer, FrameError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(FrameError::TooSmall(bytes.len()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(FrameError::TooLarge(bytes.len()));
    }

    let image = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
    let orientation = read_exif_orientation(bytes);
    let image = apply_orientation(image, orientation);
    let rgb = image.to_rgb8();

    debug!(
        width = rgb.width(),
        height = rgb.height(),
        orientation,
        size = bytes.len(),
        "Still image decoded"
    );

    Ok(PixelBuffer::from_rgb_image(rgb))
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation value.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
