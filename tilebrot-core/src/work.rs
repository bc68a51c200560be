use crate::complex::Complex;
use crate::error::CoreError;
use crate::tile::Tile;

/// One tile's worth of work, sent to a worker by value.
///
/// `frame` tags the render cycle the item belongs to so results from a
/// superseded cycle can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkItem {
    pub frame: u64,
    pub tile: Tile,
    /// Complex-plane coordinate of the tile's top-left pixel.
    pub origin: Complex,
    /// Complex-plane units per pixel.
    pub step: f64,
    pub max_iterations: u32,
}

impl WorkItem {
    /// Reject malformed items before any pixel is computed.
    pub fn validate(&self) -> crate::Result<()> {
        if self.tile.width == 0 || self.tile.height == 0 {
            return Err(CoreError::InvalidTileDimensions {
                width: self.tile.width,
                height: self.tile.height,
            });
        }
        if self.step <= 0.0 || !self.step.is_finite() {
            return Err(CoreError::InvalidStepSize(self.step));
        }
        if !self.origin.is_finite() {
            return Err(CoreError::InvalidOrigin {
                re: self.origin.re,
                im: self.origin.im,
            });
        }
        if self.max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(self.max_iterations));
        }
        Ok(())
    }
}

/// A worker's answer for one [`WorkItem`].
///
/// `pixels` starts out as raw escape counts, one per pixel in row-major
/// order; the render pipeline later overwrites them in place with packed
/// RGBA colors.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkResult {
    pub frame: u64,
    pub tile: Tile,
    pub pixels: Vec<u32>,
    /// Smallest escape count in the tile.
    pub min_iterations: u32,
    /// Largest escape count in the tile, at most the item's cap.
    pub max_iterations: u32,
}
