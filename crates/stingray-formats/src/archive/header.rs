//! Flat archive header, type table and file table records

use binrw::BinRead;
use stingray_hash::{FileId, Hash};

use crate::kind::{DataKind, Locus};

/// Flat archive magic bytes
pub const ARCHIVE_MAGIC: [u8; 4] = [0x11, 0x00, 0x00, 0xF0];

/// Size of [`ArchiveHeader`] on disk
pub const HEADER_SIZE: u64 = 72;

/// Size of one [`TypeEntry`] on disk
pub const TYPE_ENTRY_SIZE: u64 = 32;

/// Size of one [`FileRecord`] on disk
pub const FILE_RECORD_SIZE: u64 = 80;

/// Fixed archive header
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct ArchiveHeader {
    /// Magic bytes (always `11 00 00 F0`)
    pub magic: [u8; 4],
    /// Number of type table entries
    pub type_count: u32,
    /// Number of file table entries
    pub file_count: u32,
    /// Size and checksum fields not needed for lookups
    pub reserved: [u32; 15],
}

impl ArchiveHeader {
    /// Whether the magic matches
    pub fn is_valid(&self) -> bool {
        self.magic == ARCHIVE_MAGIC
    }

    /// Byte length of header plus type and file tables
    pub fn tables_size(&self) -> u64 {
        HEADER_SIZE
            + u64::from(self.type_count) * TYPE_ENTRY_SIZE
            + u64::from(self.file_count) * FILE_RECORD_SIZE
    }
}

/// Per-type summary in the type table
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct TypeEntry {
    /// Unused
    pub unk00: u64,
    /// Hash of the type name
    pub name: Hash,
    /// Number of files of this type
    pub count: u32,
    /// Unused
    pub unk01: u32,
    /// Payload alignment for this type
    pub alignment: u32,
    /// Unused
    pub unk02: u32,
}

/// One file in the file table
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct FileRecord {
    /// File identity
    pub id: FileId,
    /// Offset of main data in the archive file
    pub main_offset: u64,
    /// Offset of stream data in `.stream`
    pub stream_offset: u64,
    /// Offset of GPU data in `.gpu_resources`
    pub gpu_offset: u64,
    /// Unused
    pub unk00: u64,
    /// Unused
    pub unk01: u64,
    /// Size of main data
    pub main_size: u32,
    /// Size of stream data (0 = none)
    pub stream_size: u32,
    /// Size of GPU data (0 = none)
    pub gpu_size: u32,
    /// Alignment of main data
    pub main_alignment: u32,
    /// Alignment of GPU data
    pub gpu_alignment: u32,
    /// Position of the file within the archive
    pub index: u32,
}

impl FileRecord {
    /// Placement of one data kind
    pub fn locus(&self, kind: DataKind) -> Locus {
        match kind {
            DataKind::Main => Locus::new(self.main_offset, self.main_size),
            DataKind::Stream => Locus::new(self.stream_offset, self.stream_size),
            DataKind::Gpu => Locus::new(self.gpu_offset, self.gpu_size),
        }
    }

    /// Placement of all three kinds, indexed by [`DataKind::index`]
    pub fn loci(&self) -> [Locus; 3] {
        DataKind::ALL.map(|kind| self.locus(kind))
    }
}
