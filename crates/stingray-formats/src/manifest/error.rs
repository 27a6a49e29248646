//! DSAA manifest error types

use thiserror::Error;

use crate::bundle::BundleError;

/// Manifest-specific error type
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Invalid manifest magic bytes
    #[error("invalid manifest magic: expected \"DSAA\", got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// The `bundles.nxa` wrapper could not be read
    #[error("manifest wrapper: {0}")]
    Bundle(#[from] BundleError),

    /// The wrapper must hold exactly one chunk
    #[error("manifest wrapper has {0} chunks, expected 1")]
    WrapperChunkCount(usize),

    /// A table runs past the end of the manifest
    #[error("manifest truncated: {what} needs {declared} bytes at {offset}, {actual} available")]
    Truncated {
        /// Table being read
        what: &'static str,
        /// Start of the table
        offset: u64,
        /// Bytes required
        declared: u64,
        /// Bytes available
        actual: u64,
    },

    /// A string has no NUL terminator before the end of data
    #[error("unterminated string at offset {offset}")]
    UnterminatedString {
        /// Start of the string
        offset: u64,
    },

    /// A string is not valid UTF-8
    #[error("invalid name at offset {offset}: {source}")]
    InvalidName {
        /// Start of the string
        offset: u64,
        /// Decoding failure
        source: std::string::FromUtf8Error,
    },

    /// Entries of an item are not ascending by archive offset
    #[error("entries of {item} are not sorted by archive offset")]
    UnsortedEntries {
        /// Item file name
        item: String,
    },

    /// An entry names a bundle that does not exist
    #[error("entry of {item} references bundle {index}, manifest lists {count}")]
    BundleIndexOutOfRange {
        /// Item file name
        item: String,
        /// Referenced bundle index
        index: u32,
        /// Number of bundles
        count: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for manifest operations
pub type ManifestResult<T> = Result<T, ManifestError>;
