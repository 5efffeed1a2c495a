//! Error taxonomy for field operations

use thiserror::Error;

/// Root error type for every fallible field operation.
///
/// Every expected failure is returned to the immediate caller. Nothing in
/// the crate retries.
#[derive(Error, Debug)]
pub enum FieldError {
    /// Zero capacity, dimension mismatch, non-positive epsilon, non-finite
    /// input, bad projection or bad configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Insertion beyond a fixed capacity. The target is left unchanged.
    #[error("capacity exhausted: capacity is {capacity}")]
    CapacityExhausted { capacity: usize },

    /// Near-singular metric during inversion or evolution.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// Index past the end of a collection.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Underlying I/O failure during persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed, truncated or corrupt state file.
    #[error("state file format error: {0}")]
    Format(String),
}

pub type FieldResult<T> = Result<T, FieldError>;
