// src/error.rs
use thiserror::Error;

/// Library-wide error for gr-cloud.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CloudError {
    /// Capacity too small to keep the two boundary points of every axis.
    #[error(
        "cloud: {max_points} points cannot hold {dimensions} dimensions. \
hint: max_points must be at least 2 * dimensions"
    )]
    InsufficientCapacity { max_points: usize, dimensions: usize },

    /// A vector did not match the cloud's current dimension count.
    #[error("cloud: {context} has {got} components, expected {expected}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// NaN/±inf in an observation or query.
    /// `context` pinpoints where it came from (e.g., "observation", "sample query").
    #[error(
        "cloud: non-finite values are not allowed ({context}). \
hint: drop NaN/±inf before inserting or querying"
    )]
    NonFiniteInput { context: &'static str },

    /// Mass (component 0) must be >= 0.
    #[error("cloud: negative mass {mass} is not supported")]
    NegativeMass { mass: f64 },

    /// Range bounds must be finite with `lo <= hi`.
    #[error("cloud: invalid interval [{lo}, {hi}] on dimension {dimension}")]
    InvalidInterval { dimension: usize, lo: f64, hi: f64 },

    /// Rejected configuration value.
    #[error("cloud: invalid settings ({what})")]
    InvalidSettings { what: &'static str },

    /// Internal invariant violation (should never happen in release builds).
    #[error("cloud: internal invariant violation: {what}")]
    Invariant { what: &'static str },
}

pub type CloudResult<T> = Result<T, CloudError>;
