//! Flat archive error types

use thiserror::Error;

/// Flat archive error type
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Invalid archive magic bytes
    #[error("invalid archive magic: expected [11 00 00 F0], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Declared tables run past the end of the data
    #[error("archive truncated: tables need {declared} bytes, only {actual} available")]
    Truncated {
        /// Bytes required by the header's counts
        declared: u64,
        /// Bytes actually present
        actual: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for flat archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
