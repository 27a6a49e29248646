//! Error types for hash parsing

use thiserror::Error;

/// Errors that can occur when parsing hash values from text
#[derive(Debug, Error)]
pub enum HashError {
    /// Wrong number of hex digits
    #[error("invalid hash length: expected {expected} hex digits, got {actual}")]
    InvalidLength {
        /// Expected digit count
        expected: usize,
        /// Actual digit count
        actual: usize,
    },

    /// Input contained a non-hex character
    #[error("invalid hex in hash: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}
