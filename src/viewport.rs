//! Tiled viewport composition.
//!
//! The viewport is one contiguous 8-bit buffer that tiles every source's
//! frames in a row-major grid. It is mutated in place by the supervisor
//! only; tiles whose source delivered nothing this tick keep their
//! last-written content (stale frames are allowed by design).
//!
//! Tiles are addressed by a worker's *position* in the spawn order, never
//! by the device's bus index: a session capturing devices 3 and 7 still
//! fills tiles 0 and 1.

use crate::frame::{Frame, FrameShape};
use anyhow::{bail, Result};

/// Row-major grid geometry for `n` tiles.
///
/// rows = floor(sqrt(n)), cols = ceil(n / rows). The grid may have more
/// cells than tiles (e.g. 5 tiles in a 2x3 grid); surplus cells stay at the
/// buffer's background value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Number of tile rows.
    pub rows: u32,
    /// Number of tile columns.
    pub cols: u32,
}

impl GridLayout {
    /// Layout for `n` tiles. `n` must be at least 1.
    pub fn for_tiles(n: u32) -> Self {
        let rows = ((n as f64).sqrt().floor() as u32).max(1);
        let cols = n.div_ceil(rows);
        Self { rows, cols }
    }

    /// (row, col) cell of the tile at `position`.
    pub fn cell(&self, position: u32) -> (u32, u32) {
        (position / self.cols, position % self.cols)
    }
}

/// Composed view of all sources' most recent frames.
pub struct Viewport {
    layout: GridLayout,
    tile_shape: FrameShape,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Viewport {
    /// Zeroed viewport for `n_tiles` tiles of identical geometry.
    pub fn new(n_tiles: u32, tile_shape: FrameShape) -> Self {
        let layout = GridLayout::for_tiles(n_tiles);
        let width = layout.cols * tile_shape.width;
        let height = layout.rows * tile_shape.height;
        let len = width as usize * height as usize * tile_shape.format.channels() as usize;
        Self {
            layout,
            tile_shape,
            width,
            height,
            data: vec![0; len],
        }
    }

    /// Grid geometry.
    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    /// Geometry every tile must match.
    pub fn tile_shape(&self) -> FrameShape {
        self.tile_shape
    }

    /// Total width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Total height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The composed pixel buffer (row-major, interleaved channels).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Write `frame` into the tile at `position` (row-major order).
    ///
    /// Fails if the frame's geometry does not match the viewport's tile
    /// shape or the position is outside the grid; both indicate a broken
    /// session invariant and are treated as compose failures upstream.
    pub fn blit(&mut self, position: u32, frame: &Frame) -> Result<()> {
        if frame.shape() != self.tile_shape {
            bail!(
                "frame shape {} does not match viewport tile shape {}",
                frame.shape(),
                self.tile_shape
            );
        }
        if position >= self.layout.rows * self.layout.cols {
            bail!(
                "tile position {position} outside {}x{} grid",
                self.layout.rows,
                self.layout.cols
            );
        }

        let channels = self.tile_shape.format.channels() as usize;
        let tile_w = self.tile_shape.width as usize;
        let tile_h = self.tile_shape.height as usize;
        let total_w = self.width as usize;
        let (row, col) = self.layout.cell(position);

        let row_bytes = tile_w * channels;
        for y in 0..tile_h {
            let src_start = y * row_bytes;
            let dest_start =
                ((row as usize * tile_h + y) * total_w + col as usize * tile_w) * channels;
            self.data[dest_start..dest_start + row_bytes]
                .copy_from_slice(&frame.data[src_start..src_start + row_bytes]);
        }
        Ok(())
    }

    /// Copy of the tile at `position`, for inspection in tests and sinks.
    pub fn tile(&self, position: u32) -> Vec<u8> {
        let channels = self.tile_shape.format.channels() as usize;
        let tile_w = self.tile_shape.width as usize;
        let tile_h = self.tile_shape.height as usize;
        let total_w = self.width as usize;
        let (row, col) = self.layout.cell(position);

        let row_bytes = tile_w * channels;
        let mut out = Vec::with_capacity(row_bytes * tile_h);
        for y in 0..tile_h {
            let start = ((row as usize * tile_h + y) * total_w + col as usize * tile_w) * channels;
            out.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn shape(width: u32, height: u32) -> FrameShape {
        FrameShape {
            width,
            height,
            format: PixelFormat::Mono8,
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::mono8(width, height, vec![value; (width * height) as usize])
    }

    #[test]
    fn test_layout_math() {
        assert_eq!(GridLayout::for_tiles(1), GridLayout { rows: 1, cols: 1 });
        assert_eq!(GridLayout::for_tiles(2), GridLayout { rows: 1, cols: 2 });
        assert_eq!(GridLayout::for_tiles(3), GridLayout { rows: 1, cols: 3 });
        assert_eq!(GridLayout::for_tiles(4), GridLayout { rows: 2, cols: 2 });
        assert_eq!(GridLayout::for_tiles(5), GridLayout { rows: 2, cols: 3 });
        assert_eq!(GridLayout::for_tiles(9), GridLayout { rows: 3, cols: 3 });
    }

    #[test]
    fn test_cell_is_row_major() {
        let layout = GridLayout::for_tiles(5);
        assert_eq!(layout.cell(0), (0, 0));
        assert_eq!(layout.cell(2), (0, 2));
        assert_eq!(layout.cell(3), (1, 0));
    }

    #[test]
    fn test_blit_places_tiles() {
        let mut viewport = Viewport::new(3, shape(2, 2));
        assert_eq!(viewport.width(), 6);
        assert_eq!(viewport.height(), 2);

        viewport.blit(0, &solid(2, 2, 10)).unwrap();
        viewport.blit(2, &solid(2, 2, 30)).unwrap();

        assert_eq!(viewport.tile(0), vec![10; 4]);
        assert_eq!(viewport.tile(1), vec![0; 4]);
        assert_eq!(viewport.tile(2), vec![30; 4]);
    }

    #[test]
    fn test_stale_tile_keeps_prior_content() {
        let mut viewport = Viewport::new(2, shape(2, 2));
        viewport.blit(0, &solid(2, 2, 7)).unwrap();
        // A tick where only tile 1 receives a frame must leave tile 0 as-is.
        viewport.blit(1, &solid(2, 2, 9)).unwrap();
        assert_eq!(viewport.tile(0), vec![7; 4]);
    }

    #[test]
    fn test_blit_rejects_shape_mismatch() {
        let mut viewport = Viewport::new(2, shape(2, 2));
        let err = viewport.blit(0, &solid(3, 2, 1)).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_blit_rejects_out_of_grid_position() {
        let mut viewport = Viewport::new(2, shape(2, 2));
        assert!(viewport.blit(2, &solid(2, 2, 1)).is_err());
    }
}
