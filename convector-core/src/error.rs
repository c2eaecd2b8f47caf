//! Error types for convector-core.

use thiserror::Error;

/// Result type alias using ConvectorError.
pub type ConvectorResult<T> = Result<T, ConvectorError>;

/// Errors that can abort a conversion.
///
/// Degenerate geometry (a non-invertible transform, painting without a
/// current point) is not an error: those calls simply paint nothing.
#[derive(Debug, Error)]
pub enum ConvectorError {
    /// Unparseable token or unexpected end of data.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A recognized directive that is intentionally not implemented.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// A directive that the format does not define at all.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// A Bézier segment needs one, two or three coordinate pairs.
    #[error("Invalid point count: {0} coordinates (expected 2, 4 or 6)")]
    InvalidPointCount(usize),

    /// Raster encoding error.
    #[error("Raster error: {0}")]
    RasterError(String),

    /// Read or write failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConvectorError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ConvectorError::MalformedInput(msg.into())
    }
}
