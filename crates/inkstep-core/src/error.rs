//! Errors raised at the engine's serialization boundaries.
//!
//! Engine operations themselves never fail; they report boundary conditions
//! through `Option` and `bool`. Only loading configuration and timeline
//! snapshots can go wrong.

use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for fallible engine boundaries.
pub type EngineResult<T> = Result<T, EngineError>;
