use thiserror::Error;

/// Errors originating from the core engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid step size: {0} (must be positive and finite)")]
    InvalidStepSize(f64),

    #[error("invalid scale: {0} (must be positive and finite)")]
    InvalidScale(f64),

    #[error("invalid tile dimensions: {width}×{height}")]
    InvalidTileDimensions { width: u32, height: u32 },

    #[error("invalid tile origin: ({re}, {im})")]
    InvalidOrigin { re: f64, im: f64 },

    #[error("invalid tiling: {width}×{height} raster into {rows} rows × {cols} cols")]
    InvalidTiling {
        width: u32,
        height: u32,
        rows: u32,
        cols: u32,
    },

    #[error(transparent)]
    ViewStateParse(#[from] ViewStateParseError),
}

/// Why a serialized view state was rejected.
///
/// Any of these makes the whole parse fail; callers fall back to the
/// default view rather than patching individual fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewStateParseError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}
