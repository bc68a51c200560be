use thiserror::Error;

use tilebrot_core::{CoreError, Tile};

/// Errors originating from the worker pool and rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The kernel rejected a malformed work item.
    #[error("kernel rejected tile {tile:?}: {source}")]
    Kernel {
        tile: Tile,
        #[source]
        source: CoreError,
    },

    /// The kernel panicked while computing a tile. The worker survives.
    #[error("worker panicked on tile {tile:?}: {message}")]
    WorkerPanicked { tile: Tile, message: String },

    /// The worker thread could not accept the item.
    #[error("worker {worker} is unavailable for tile {tile:?}")]
    WorkerUnavailable { worker: usize, tile: Tile },

    #[error("worker pool disposed")]
    Disposed,

    /// A worker answered with a result that does not belong to the
    /// submission it was paired with.
    #[error("malformed result for tile {tile:?} in frame {frame}: {reason}")]
    MalformedResult {
        frame: u64,
        tile: Tile,
        reason: String,
    },

    /// The surface handed to the pipeline is not the size it renders for.
    #[error("surface is {actual:?} but the frame was rendered for {expected:?}")]
    SurfaceMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RenderError {
    /// The tile this error concerns, if it is tied to one.
    pub fn tile(&self) -> Option<Tile> {
        match self {
            Self::Kernel { tile, .. }
            | Self::WorkerPanicked { tile, .. }
            | Self::WorkerUnavailable { tile, .. }
            | Self::MalformedResult { tile, .. } => Some(*tile),
            _ => None,
        }
    }
}
