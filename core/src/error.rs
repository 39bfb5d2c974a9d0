//! Error types for the linscan index.
//!
//! Build-path errors are raised before anything is written for the offending
//! document, and query-path errors before any posting list is touched, so an
//! error never leaves the index half-updated.

use crate::{DimId, DocId};
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A weight was NaN or infinite.
    #[error("invalid weight {weight} for dimension {dim}")]
    InvalidWeight { dim: DimId, weight: f32 },

    /// The same dimension appeared twice in one document.
    #[error("duplicate dimension {dim} in document {doc}")]
    DuplicateDimension { doc: DocId, dim: DimId },

    /// A document id lower than one already in the posting list.
    #[error("document {doc} appended to dimension {dim} after document {last}")]
    OutOfOrder { dim: DimId, doc: DocId, last: DocId },

    /// A negative dimension id came out of an external loader.
    #[error("invalid dimension {dim} in row {row}")]
    InvalidDimension { row: usize, dim: i64 },

    #[error("posting store is sealed; no further appends are accepted")]
    StoreSealed,

    #[error("posting store was already finalized")]
    AlreadyFinalized,

    /// A read handle was requested before the index was finalized.
    #[error("index is still being built")]
    NotFinalized,

    #[error("budget {0} is outside (0, 1]")]
    InvalidBudget(f64),

    #[error("time budget {0} ms is not a finite non-negative number")]
    InvalidTimeBudget(f64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Malformed sparse-matrix file.
    #[error("format error: {0}")]
    Format(String),
}
