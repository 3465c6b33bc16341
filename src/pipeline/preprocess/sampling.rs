use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::pipeline::frame::PixelBuffer;

/// Source region cropped from a frame before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(frame: &PixelBuffer) -> Self {
        Self {
            x: 0,
            y: 0,
            width: frame.width(),
            height: frame.height(),
        }
    }

    /// Largest centred square.
    pub fn center_square(frame: &PixelBuffer) -> Self {
        let side = frame.width().min(frame.height());
        Self {
            x: (frame.width() - side) / 2,
            y: (frame.height() - side) / 2,
            width: side,
            height: side,
        }
    }

    fn is_whole(&self, image: &RgbImage) -> bool {
        self.x == 0 && self.y == 0 && (self.width, self.height) == image.dimensions()
    }
}

/// Crop `region` out of `image` and resize it to `size x size` (triangle filter).
///
/// A region already at the target size is returned untouched.
pub fn crop_and_resize(image: RgbImage, region: Region, size: u32) -> RgbImage {
    let cropped = if region.is_whole(&image) {
        image
    } else {
        imageops::crop_imm(&image, region.x, region.y, region.width, region.height).to_image()
    };

    if cropped.dimensions() == (size, size) {
        return cropped;
    }
    imageops::resize(&cropped, size, size, FilterType::Triangle)
}
