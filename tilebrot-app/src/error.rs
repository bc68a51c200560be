use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the headless driver.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid event `{spec}`: {reason}")]
    InvalidEvent { spec: String, reason: String },

    #[error("invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error(transparent)]
    Render(#[from] tilebrot_render::RenderError),
}

/// Convenience result type for the app crate.
pub type Result<T> = std::result::Result<T, AppError>;
