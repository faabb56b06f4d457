use thiserror::Error;

/// Errors reported by the ray-tracing engine and the worker.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Zero triangles, NaN vertices, or degenerate-only input.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Out-of-range or inconsistent simulation parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// `simulate` arrived before geometry was set.
    #[error("geometry not set")]
    NotReady,

    /// Cancel or terminate observed between batches.
    #[error("simulation cancelled")]
    Cancelled,

    /// Unexpected numerics; reported when too many rays abort.
    #[error("internal error: {0}")]
    InternalError(String),
}
