//! Error types surfaced by the alignment pipeline.
//!
//! Only setup failures and a globally degenerate final transform reach the
//! caller. Singular linear systems inside the estimators are recovered with
//! least-squares fallbacks and intermediate degenerate warps are reported to
//! the minimizer as a sentinel cost, so neither appears here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignError {
    /// The mask has no foreground pixels; there is nothing to register.
    #[error("mask has no foreground pixels")]
    EmptyMask,

    /// The final transform maps the valid domain entirely outside the image.
    #[error("degenerate transform: {0}")]
    DegenerateTransform(String),

    /// Two rasters that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `align` was called before a successful `setup`.
    #[error("optimizer has not been set up")]
    NotSetUp,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AlignError>;

impl AlignError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateTransform(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}
