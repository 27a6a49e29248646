//! DSAR header and chunk table records

use binrw::BinRead;

/// Bundle magic bytes
pub const BUNDLE_MAGIC: [u8; 4] = *b"DSAR";

/// Size of [`BundleHeader`] on disk
pub const HEADER_SIZE: u64 = 32;

/// Size of one [`Chunk`] record on disk
pub const CHUNK_RECORD_SIZE: u64 = 32;

/// How a chunk's bytes are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Stored raw
    Uncompressed,
    /// One LZ4 block, no frame or size prefix
    Lz4,
    /// Any other tag; kept so the layout loads, rejected when read
    Unknown(u8),
}

impl CompressionKind {
    /// Parse from the on-disk tag
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Uncompressed,
            3 => Self::Lz4,
            other => Self::Unknown(other),
        }
    }

    /// On-disk tag
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Lz4 => 3,
            Self::Unknown(other) => other,
        }
    }
}

/// Fixed bundle header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct BundleHeader {
    /// Magic bytes (always "DSAR")
    pub magic: [u8; 4],
    /// Format version marker
    pub version: u32,
    /// Number of chunk records
    pub chunk_count: u32,
    /// Header plus chunk table size
    pub header_size: u32,
    /// Total uncompressed size of all chunks
    pub uncompressed_size: u64,
    /// Unused
    pub reserved: u64,
}

/// One independently stored span of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Chunk {
    /// Start of this chunk in the bundle's uncompressed space
    pub uncompressed_offset: u64,
    /// Byte offset of the stored data in the bundle file
    pub compressed_offset: u64,
    /// Length once decompressed
    pub uncompressed_size: u32,
    /// Length as stored
    pub compressed_size: u32,
    /// Storage encoding
    #[br(map = |b: u8| CompressionKind::from_byte(b), pad_after = 7)]
    pub compression: CompressionKind,
}

impl Chunk {
    /// First uncompressed offset past this chunk
    pub const fn uncompressed_end(&self) -> u64 {
        self.uncompressed_offset.saturating_add(self.uncompressed_size as u64)
    }
}
