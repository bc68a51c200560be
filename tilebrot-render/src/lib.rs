pub mod color;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod pool;
pub mod surface;

pub use color::{ColorTable, BACKGROUND_COLOR, NEVER_ESCAPED_COLOR};
pub use error::RenderError;
pub use export::export_png;
pub use pipeline::{
    FrameOutcome, FrameReport, FrameStats, RenderConfig, RenderPhase, RenderPipeline,
    RenderRequest,
};
pub use pool::{default_worker_count, TaskFuture, TaskOutcome, WorkerPool};
pub use surface::{RenderBuffer, Surface};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
