//! Error type for construction-time failures.
//!
//! Frame stepping never fails: bad input is clamped or ignored. Only building
//! a world, a terrain layer or a config can produce a `SimError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("terrain grid needs at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("terrain cell size must be positive and finite (got {0})")]
    InvalidCellSize(f32),

    #[error("terrain layer geometry does not match the primary layer")]
    LayerMismatch,

    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}
