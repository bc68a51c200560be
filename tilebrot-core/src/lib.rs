pub mod complex;
pub mod error;
pub mod kernel;
pub mod tile;
pub mod view_state;
pub mod work;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use error::{CoreError, ViewStateParseError};
pub use kernel::{compute_tile, escape_time, EscapeTime, TileKernel};
pub use tile::{tile_grid, Tile};
pub use view_state::ViewState;
pub use work::{WorkItem, WorkResult};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
