//! Padding and overlapping tile placement over a full image.
//!
//! The image is padded by one stride on the top/left and by enough on the
//! bottom/right that `padded_dim - window` is a multiple of the stride. Tiles
//! of `window` size are then placed every `stride` pixels in row-major order.
//! With the conventional `window = 2 * stride` every interior pixel is seen by
//! up to four tiles.

use crate::image::{ImageView, OwnedImage};
use crate::util::{TileDetectError, TileDetectResult};

/// Window and stride of the sliding tile grid, in `(rows, cols)` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGeometry {
    /// Tile height in pixels.
    pub window_rows: usize,
    /// Tile width in pixels.
    pub window_cols: usize,
    /// Vertical step between tiles.
    pub stride_rows: usize,
    /// Horizontal step between tiles.
    pub stride_cols: usize,
}

impl TileGeometry {
    /// Builds the conventional geometry with `window = 2 * stride`.
    pub fn from_stride(stride_rows: usize, stride_cols: usize) -> Self {
        Self {
            window_rows: stride_rows.saturating_mul(2),
            window_cols: stride_cols.saturating_mul(2),
            stride_rows,
            stride_cols,
        }
    }

    /// Checks the stride/window relationship.
    pub fn validate(&self) -> TileDetectResult<()> {
        if self.stride_rows == 0 {
            return Err(TileDetectError::InvalidConfig {
                field: "stride_rows",
                reason: "must be positive",
            });
        }
        if self.stride_cols == 0 {
            return Err(TileDetectError::InvalidConfig {
                field: "stride_cols",
                reason: "must be positive",
            });
        }
        if self.window_rows < self.stride_rows {
            return Err(TileDetectError::InvalidConfig {
                field: "window_rows",
                reason: "must be at least stride_rows",
            });
        }
        if self.window_cols < self.stride_cols {
            return Err(TileDetectError::InvalidConfig {
                field: "window_cols",
                reason: "must be at least stride_cols",
            });
        }
        Ok(())
    }
}

impl Default for TileGeometry {
    fn default() -> Self {
        Self::from_stride(256, 256)
    }
}

/// Padding added around the original image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Padding {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

/// Trailing padding for one axis: `stride - dim % stride`, plus one more
/// stride unless the result is already a multiple of the window.
///
/// For windows other than `2 * stride` the pad is then grown until the
/// padded axis holds at least one window and the last window ends flush with
/// the padded edge. With `window = 2 * stride` this never changes the result.
/// Assumes the leading pad is one stride.
fn trailing_pad(dim: usize, stride: usize, window: usize) -> usize {
    let mut pad = stride - dim % stride;
    if pad % window > 0 {
        pad += stride;
    }
    let padded = dim + stride + pad;
    if padded < window {
        pad += window - padded;
    }
    let overhang = (dim + stride + pad - window) % stride;
    if overhang > 0 {
        pad += stride - overhang;
    }
    pad
}

/// Top-left offset of a tile in padded-image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilePlacement {
    /// Position of the tile in row-major scan order.
    pub index: usize,
    /// Row offset into the padded image.
    pub row: usize,
    /// Column offset into the padded image.
    pub col: usize,
}

/// Pixels of one tile, zero where the window reaches into padding.
#[derive(Clone, Debug)]
pub struct Tile {
    pub placement: TilePlacement,
    pub pixels: OwnedImage<u8>,
}

/// Padding plus the grid of tile placements covering a padded image.
#[derive(Clone, Debug)]
pub struct PaddedTileGrid {
    height: usize,
    width: usize,
    geometry: TileGeometry,
    padding: Padding,
    rows: usize,
    cols: usize,
}

impl PaddedTileGrid {
    /// Computes padding and tile counts for an `height x width` image.
    pub fn new(height: usize, width: usize, geometry: TileGeometry) -> TileDetectResult<Self> {
        geometry.validate()?;
        if width == 0 || height == 0 {
            return Err(TileDetectError::InvalidDimensions { width, height });
        }

        let padding = Padding {
            left: geometry.stride_cols,
            top: geometry.stride_rows,
            right: trailing_pad(width, geometry.stride_cols, geometry.window_cols),
            bottom: trailing_pad(height, geometry.stride_rows, geometry.window_rows),
        };
        let padded_height = height + padding.top + padding.bottom;
        let padded_width = width + padding.left + padding.right;

        let rows = axis_steps(padded_height, geometry.window_rows, geometry.stride_rows);
        let cols = axis_steps(padded_width, geometry.window_cols, geometry.stride_cols);

        Ok(Self {
            height,
            width,
            geometry,
            padding,
            rows,
            cols,
        })
    }

    /// Returns the original image height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the original image width.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    pub fn padded_height(&self) -> usize {
        self.height + self.padding.top + self.padding.bottom
    }

    pub fn padded_width(&self) -> usize {
        self.width + self.padding.left + self.padding.right
    }

    /// Number of tile rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of tile columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the placement at `index` in row-major order.
    pub fn placement(&self, index: usize) -> Option<TilePlacement> {
        if index >= self.len() {
            return None;
        }
        Some(TilePlacement {
            index,
            row: (index / self.cols) * self.geometry.stride_rows,
            col: (index % self.cols) * self.geometry.stride_cols,
        })
    }

    /// Iterates placements in row-major order.
    pub fn placements(&self) -> impl Iterator<Item = TilePlacement> + '_ {
        (0..self.len()).filter_map(move |index| self.placement(index))
    }

    /// Copies the window at `placement` out of `image`, filling padding with 0.
    pub fn extract_tile(
        &self,
        image: ImageView<'_, u8>,
        placement: TilePlacement,
    ) -> TileDetectResult<Tile> {
        if image.width() != self.width || image.height() != self.height {
            return Err(TileDetectError::InvalidDimensions {
                width: image.width(),
                height: image.height(),
            });
        }

        let win_h = self.geometry.window_rows;
        let win_w = self.geometry.window_cols;
        let mut pixels = OwnedImage::<u8>::zeros(win_w, win_h)?;

        // Overlap of the window with the original image, in padded coordinates.
        let img_x0 = self.padding.left;
        let img_y0 = self.padding.top;
        let x0 = placement.col.max(img_x0);
        let x1 = (placement.col + win_w).min(img_x0 + self.width);
        let y0 = placement.row.max(img_y0);
        let y1 = (placement.row + win_h).min(img_y0 + self.height);

        if x0 < x1 {
            for py in y0..y1 {
                let src = image
                    .row(py - img_y0)
                    .ok_or(TileDetectError::BufferTooSmall {
                        needed: (py - img_y0 + 1) * image.stride(),
                        got: image.as_slice().len(),
                    })?;
                let dst = pixels.row_mut(py - placement.row).ok_or(
                    TileDetectError::InvalidDimensions {
                        width: win_w,
                        height: win_h,
                    },
                )?;
                dst[x0 - placement.col..x1 - placement.col]
                    .copy_from_slice(&src[x0 - img_x0..x1 - img_x0]);
            }
        }

        Ok(Tile { placement, pixels })
    }

    /// Number of tiles whose window contains original pixel `(x, y)`.
    pub fn coverage_at(&self, x: usize, y: usize) -> usize {
        let px = x + self.padding.left;
        let py = y + self.padding.top;
        let along_rows = covering_steps(py, self.rows, self.geometry.window_rows, self.geometry.stride_rows);
        let along_cols = covering_steps(px, self.cols, self.geometry.window_cols, self.geometry.stride_cols);
        along_rows * along_cols
    }
}

/// Number of window placements `0, stride, 2*stride, ..` with `start + window <= dim`.
fn axis_steps(dim: usize, window: usize, stride: usize) -> usize {
    if dim < window {
        return 0;
    }
    (dim - window) / stride + 1
}

/// Number of the first `steps` windows along one axis that contain `pos`.
fn covering_steps(pos: usize, steps: usize, window: usize, stride: usize) -> usize {
    (0..steps)
        .filter(|&k| {
            let start = k * stride;
            start <= pos && pos < start + window
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::{trailing_pad, PaddedTileGrid, TileGeometry};
    use crate::util::TileDetectError;

    #[test]
    fn trailing_pad_follows_reference_rule() {
        // 1000 % 256 = 232 -> 24, then 24 % 512 > 0 -> 280.
        assert_eq!(trailing_pad(1000, 256, 512), 280);
        // Exact multiple: 256 % 512 > 0 -> 512.
        assert_eq!(trailing_pad(1024, 256, 512), 512);
    }

    #[test]
    fn trailing_pad_fits_wide_window_on_tiny_axis() {
        // 1 + 2 + 3 = 6 < 8 -> grow to 8.
        assert_eq!(trailing_pad(1, 2, 8), 5);
        let geometry = TileGeometry {
            window_rows: 8,
            window_cols: 8,
            stride_rows: 2,
            stride_cols: 2,
        };
        let grid = PaddedTileGrid::new(1, 1, geometry).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.coverage_at(0, 0), 1);
    }

    #[test]
    fn trailing_pad_aligns_non_multiple_window() {
        // 10 % 4 = 2 -> 2 -> 6; padded 20, (20 - 6) % 4 = 2 -> 8.
        assert_eq!(trailing_pad(10, 4, 6), 8);
    }

    #[test]
    fn rejects_zero_stride() {
        let err = PaddedTileGrid::new(10, 10, TileGeometry::from_stride(0, 4)).unwrap_err();
        assert_eq!(
            err,
            TileDetectError::InvalidConfig {
                field: "stride_rows",
                reason: "must be positive",
            }
        );
    }

    #[test]
    fn rejects_window_smaller_than_stride() {
        let geometry = TileGeometry {
            window_rows: 8,
            window_cols: 3,
            stride_rows: 4,
            stride_cols: 4,
        };
        let err = PaddedTileGrid::new(10, 10, geometry).unwrap_err();
        assert!(matches!(
            err,
            TileDetectError::InvalidConfig {
                field: "window_cols",
                ..
            }
        ));
    }

    #[test]
    fn small_grid_layout() {
        let grid = PaddedTileGrid::new(10, 13, TileGeometry::from_stride(4, 4)).unwrap();
        let pad = grid.padding();
        assert_eq!((pad.left, pad.top), (4, 4));
        // 13 % 4 = 1 -> 3 -> 7; 10 % 4 = 2 -> 2 -> 6.
        assert_eq!((pad.right, pad.bottom), (7, 6));
        assert_eq!(grid.padded_width(), 24);
        assert_eq!(grid.padded_height(), 20);
        assert_eq!(grid.cols(), 5);
        assert_eq!(grid.rows(), 4);
        let last = grid.placement(grid.len() - 1).unwrap();
        assert_eq!((last.row, last.col), (12, 16));
        assert!(grid.placement(grid.len()).is_none());
    }

    #[test]
    fn extract_tile_zero_fills_padding() {
        let data: Vec<u8> = (1u8..=16).collect();
        let image = crate::ImageView::from_slice(&data, 4, 4).unwrap();
        let grid = PaddedTileGrid::new(4, 4, TileGeometry::from_stride(2, 2)).unwrap();
        let first = grid.placement(0).unwrap();
        let tile = grid.extract_tile(image, first).unwrap();
        let view = tile.pixels.view();
        assert_eq!(view.row(0).unwrap(), &[0, 0, 0, 0]);
        assert_eq!(view.row(1).unwrap(), &[0, 0, 0, 0]);
        assert_eq!(view.row(2).unwrap(), &[0, 0, 1, 2]);
        assert_eq!(view.row(3).unwrap(), &[0, 0, 5, 6]);
    }
}
