use crate::error::CoreError;

/// Default number of horizontal bands. Many thin bands keep every worker
/// busy until the end of a frame without paying per-pixel dispatch costs.
pub const DEFAULT_ROWS: u32 = 500;

/// Default number of columns per band.
pub const DEFAULT_COLS: u32 = 1;

/// A rectangular region of the output raster, the unit of parallel work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Pixel x of the top-left corner.
    pub x: u32,
    /// Pixel y of the top-left corner.
    pub y: u32,
    /// Tile width in pixels (the last column takes the remainder).
    pub width: u32,
    /// Tile height in pixels (the last band takes the remainder).
    pub height: u32,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the tile lies entirely inside a `width`×`height` raster.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Split `extent` pixels into at most `parts` spans of `ceil(extent / parts)`,
/// the last span taking the remainder.
///
/// When `parts` is large relative to `extent` the nominal count would leave a
/// zero or negative remainder, so the span count is reduced to the number of
/// spans actually needed.
fn spans(extent: u32, parts: u32) -> impl Iterator<Item = (u32, u32)> {
    let step = extent.div_ceil(parts);
    let count = extent.div_ceil(step);
    (0..count).map(move |i| {
        let start = i * step;
        let len = if i + 1 < count { step } else { extent - start };
        (start, len)
    })
}

/// Partition a `width`×`height` raster into a `rows`×`cols` grid of tiles,
/// in row-major order.
///
/// The tiles cover the raster exactly, never overlap and are never empty.
pub fn tile_grid(width: u32, height: u32, rows: u32, cols: u32) -> crate::Result<Vec<Tile>> {
    if width == 0 || height == 0 || rows == 0 || cols == 0 {
        return Err(CoreError::InvalidTiling {
            width,
            height,
            rows,
            cols,
        });
    }

    let columns: Vec<(u32, u32)> = spans(width, cols).collect();
    let mut tiles = Vec::with_capacity(rows.min(height) as usize * columns.len());
    for (y, tile_height) in spans(height, rows) {
        for &(x, tile_width) in &columns {
            tiles.push(Tile::new(x, y, tile_width, tile_height));
        }
    }
    Ok(tiles)
}
