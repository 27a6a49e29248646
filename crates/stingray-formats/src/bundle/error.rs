//! DSAR bundle error types

use thiserror::Error;

/// Bundle-specific error type
#[derive(Debug, Error)]
pub enum BundleError {
    /// Invalid bundle magic bytes
    #[error("invalid bundle magic: expected \"DSAR\", got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Declared header size cannot hold the chunk table
    #[error("invalid header size: {declared} bytes declared, chunk table needs {required}")]
    InvalidHeaderSize {
        /// Size from the header
        declared: u32,
        /// Size implied by the chunk count
        required: u64,
    },

    /// Chunk table is not ascending by uncompressed offset
    #[error("chunk {index} is out of order")]
    UnsortedChunks {
        /// Index of the first out-of-order chunk
        index: usize,
    },

    /// Chunk does not start where the previous one ended
    #[error("chunk {index} does not start at uncompressed offset {expected}")]
    ChunkGap {
        /// Index of the misplaced chunk
        index: usize,
        /// End of the previous chunk
        expected: u64,
    },

    /// Chunk ends past the header's uncompressed size
    #[error("chunk {index} ends past the bundle's uncompressed size of {size} bytes")]
    ChunkOutOfBounds {
        /// Index of the offending chunk
        index: usize,
        /// Uncompressed size from the header
        size: u64,
    },

    /// No chunk starts at the offset a manifest entry points to
    #[error("no chunk starts at uncompressed offset {offset}")]
    ChunkNotFound {
        /// Requested uncompressed offset
        offset: u64,
    },

    /// Unsupported compression kind
    #[error("unsupported compression kind: 0x{0:02X}")]
    UnsupportedCompression(u8),

    /// Chunk larger than the configured limit
    #[error("chunk size {size} exceeds limit of {limit} bytes")]
    ChunkTooLarge {
        /// Declared size
        size: usize,
        /// Allowed maximum
        limit: usize,
    },

    /// Decompressed size differs from the chunk table
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Size from the chunk table
        expected: usize,
        /// Size produced
        actual: usize,
    },

    /// LZ4 block could not be decoded
    #[error("LZ4 decompression failed: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    /// A requested range runs past the last chunk
    #[error("range of {requested} bytes at {offset} runs past the end of the bundle")]
    RangeOutOfBounds {
        /// Start of the range
        offset: u64,
        /// Requested length
        requested: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for bundle operations
pub type BundleResult<T> = Result<T, BundleError>;
