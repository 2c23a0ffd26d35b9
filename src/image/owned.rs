//! Owned contiguous 2D buffers.

use crate::image::ImageView;
use crate::util::{TileDetectError, TileDetectResult};

/// Owned contiguous 2D buffer (`stride == width`).
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

/// Per-pixel classifier output for one tile, values in `0..=255`.
pub type ResponseMap = OwnedImage<f32>;

impl<T> OwnedImage<T> {
    /// Wraps a row-major buffer whose length is exactly `width * height`.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> TileDetectResult<Self> {
        if width == 0 || height == 0 {
            return Err(TileDetectError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(TileDetectError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(TileDetectError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(TileDetectError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row-major pixel data.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consumes the image and returns its pixel buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}

impl<T: Copy + Default> OwnedImage<T> {
    /// Allocates a `width x height` buffer filled with `T::default()`.
    pub fn zeros(width: usize, height: usize) -> TileDetectResult<Self> {
        let len = width
            .checked_mul(height)
            .ok_or(TileDetectError::InvalidDimensions { width, height })?;
        Self::new(vec![T::default(); len], width, height)
    }

    /// Copies a (possibly strided) view into contiguous storage.
    pub fn from_view(view: ImageView<'_, T>) -> TileDetectResult<Self> {
        let width = view.width();
        let height = view.height();
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = view.row(y).ok_or(TileDetectError::BufferTooSmall {
                needed: y * view.stride() + width,
                got: view.as_slice().len(),
            })?;
            data.extend_from_slice(row);
        }
        Self::new(data, width, height)
    }

    /// Returns a mutable slice for row `y`.
    pub(crate) fn row_mut(&mut self, y: usize) -> Option<&mut [T]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        self.data.get_mut(start..start + self.width)
    }
}

impl OwnedImage<u8> {
    /// Converts intensities to an `f32` response map without rescaling.
    pub fn to_response(&self) -> ResponseMap {
        OwnedImage {
            data: self.data.iter().map(|&v| f32::from(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }
}
