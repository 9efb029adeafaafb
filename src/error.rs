//! Error taxonomy for a single file conversion.
//!
//! Input errors (missing, unreadable, headerless files) and fatal conversion
//! errors (a row too large for any command) are both reported per file; the
//! orchestration in [`crate::convert`] decides whether the run continues.
//! Rows whose field count differs from the header are never an error.

use std::path::PathBuf;

use thiserror::Error;

pub type ConvertResult<T> = Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("input {0:?} not found")]
    MissingInput(PathBuf),

    #[error("input {path:?} not readable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input {0:?} has no header row")]
    MissingHeader(PathBuf),

    #[error("input {0:?} has no usable columns after header filtering")]
    NoColumns(PathBuf),

    #[error("line {line}: failed to decode text with encoding {encoding}")]
    Decode { line: u64, encoding: &'static str },

    /// A single value tuple does not fit in an otherwise empty command.
    #[error("row on line {line} renders to {tuple_bytes} bytes, exceeding the {budget} byte INSERT budget")]
    RowTooLarge {
        line: u64,
        tuple_bytes: usize,
        budget: usize,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
