//! Convenience helpers for loading micrographs via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Multi-channel inputs are
//! reduced to a single luma channel here, before they reach the detector.

use crate::image::{ImageView, OwnedImage};
use crate::util::{TileDetectError, TileDetectResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> TileDetectResult<ImageView<'_, u8>> {
    ImageView::from_slice(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// Creates an owned image from a grayscale image buffer.
pub fn owned_from_gray_image(img: &image::GrayImage) -> TileDetectResult<OwnedImage<u8>> {
    OwnedImage::new(
        img.as_raw().clone(),
        img.width() as usize,
        img.height() as usize,
    )
}

/// Loads an image from disk (PNG, JPEG, TIFF) as an owned grayscale image.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> TileDetectResult<OwnedImage<u8>> {
    let img = image::open(path).map_err(|err| TileDetectError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_gray_image(&img.to_luma8())
}
