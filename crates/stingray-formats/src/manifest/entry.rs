//! DSAA header, item and entry records

use binrw::BinRead;
use stingray_hash::Hash;

use crate::kind::DataKind;

/// Manifest magic bytes
pub const MANIFEST_MAGIC: [u8; 4] = *b"DSAA";

/// Size of [`ManifestHeader`] on disk
pub const HEADER_SIZE: u64 = 16;

/// Size of one [`ArchiveItemHeader`] on disk
pub const ITEM_HEADER_SIZE: u64 = 24;

/// Size of one [`ManifestEntry`] on disk
pub const ENTRY_SIZE: u64 = 24;

/// Fixed manifest header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct ManifestHeader {
    /// Magic bytes (always "DSAA")
    pub magic: [u8; 4],
    /// Format version
    pub version: u32,
    /// Number of logical archive items
    pub item_count: u32,
    /// Number of bundle files
    pub bundle_count: u32,
}

/// Table record describing one logical archive
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct ArchiveItemHeader {
    /// Logical archive length
    pub size: u64,
    /// Offset of the NUL-terminated file name
    pub filename_offset: u32,
    /// Number of routing entries
    pub entry_count: u32,
    /// Offset of the routing entries
    pub entries_offset: u64,
}

/// Routes a span of a logical archive to a bundle chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct ManifestEntry {
    /// Offset inside the logical archive where this span starts
    pub archive_offset: u64,
    /// Uncompressed offset of the chunk holding it, within the bundle
    pub uncompressed_bundle_offset: u64,
    /// Index into the manifest's bundle table
    #[br(pad_after = 4)]
    pub bundle_index: u32,
}

/// One logical archive (main, `.stream` or `.gpu_resources`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveItem {
    /// File name, e.g. `9ba626afa44a3aa3.stream`
    pub filename: String,
    /// Logical archive length
    pub size: u64,
    /// Routing entries ascending by archive offset
    pub entries: Vec<ManifestEntry>,
}

impl ArchiveItem {
    /// Archive hash and data kind encoded in the file name
    ///
    /// `None` for names that are not `<16 hex>[.stream|.gpu_resources]`.
    pub fn identity(&self) -> Option<(Hash, DataKind)> {
        let (stem, ext) = match self.filename.split_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (self.filename.as_str(), None),
        };
        let kind = DataKind::from_extension(ext)?;
        let hash = Hash::from_hex(stem).ok()?;
        Some((hash, kind))
    }

    /// Index of the entry covering archive `offset`
    ///
    /// Exact match if an entry starts at `offset`, otherwise its
    /// predecessor. Offsets at or past `size` yield `None`.
    pub fn find_entry(&self, offset: u64) -> Option<usize> {
        if offset >= self.size {
            return None;
        }
        self.entries
            .partition_point(|e| e.archive_offset <= offset)
            .checked_sub(1)
    }

    /// End of the span routed by entry `index`
    pub fn entry_end(&self, index: usize) -> u64 {
        self.entries
            .get(index + 1)
            .map_or(self.size, |next| next.archive_offset)
    }
}
