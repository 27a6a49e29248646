//! Flat archive format
//!
//! The fat edition stores each archive as one uncompressed main file named
//! by the archive hash, with optional `.stream` and `.gpu_resources`
//! companions. The main file starts with a header, a type table and a file
//! table; file records carry offsets into all three files.
//!
//! In the slim edition the same layout is found after decompressing a
//! logical archive's chunks.
//!
//! ```text
//! +-----------------+ 0
//! | ArchiveHeader   | 72 bytes
//! +-----------------+
//! | TypeEntry * N   | 32 bytes each
//! +-----------------+
//! | FileRecord * M  | 80 bytes each
//! +-----------------+ tables_size()
//! | main payloads   |
//! +-----------------+
//! ```
//!
//! The archive's identity is not stored in the bytes; callers pass the hash
//! decoded from the file name.

mod error;
mod header;

pub use error::{ArchiveError, ArchiveResult};
pub use header::{
    ARCHIVE_MAGIC, ArchiveHeader, FILE_RECORD_SIZE, FileRecord, HEADER_SIZE, TYPE_ENTRY_SIZE,
    TypeEntry,
};

use binrw::BinRead;
use binrw::io::{Cursor, Read, Seek, SeekFrom};
use stingray_hash::Hash;

/// Parsed archive index (header and tables, never payloads)
#[derive(Debug, Clone)]
pub struct FlatArchive {
    /// Archive identity, taken from the file name
    pub id: Hash,
    /// Archive header
    pub header: ArchiveHeader,
    /// Type table in file order
    pub types: Vec<TypeEntry>,
    /// File table in file order
    pub files: Vec<FileRecord>,
}

impl FlatArchive {
    /// Load the index of an archive from its main stream
    ///
    /// Reads from the current position; the stream must be positioned at
    /// the start of the archive.
    pub fn load<R: Read + Seek>(id: Hash, reader: &mut R) -> ArchiveResult<Self> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;
        let available = end.saturating_sub(start);

        if available < HEADER_SIZE {
            return Err(ArchiveError::Truncated {
                declared: HEADER_SIZE,
                actual: available,
            });
        }

        let header = read_header(reader)?;
        let declared = header.tables_size();
        if declared > available {
            return Err(ArchiveError::Truncated {
                declared,
                actual: available,
            });
        }

        let types = (0..header.type_count)
            .map(|_| TypeEntry::read(reader))
            .collect::<Result<Vec<_>, _>>()?;
        let files = (0..header.file_count)
            .map(|_| FileRecord::read(reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            header,
            types,
            files,
        })
    }

    /// Load from an in-memory copy of (at least) the header and tables
    pub fn parse(id: Hash, data: &[u8]) -> ArchiveResult<Self> {
        Self::load(id, &mut Cursor::new(data))
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the archive lists no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Read and validate just the fixed header
///
/// Slim-edition loading uses this to learn how many bytes of tables to
/// decompress before calling [`FlatArchive::parse`].
pub fn read_header<R: Read + Seek>(reader: &mut R) -> ArchiveResult<ArchiveHeader> {
    let header = ArchiveHeader::read(reader)?;
    if !header.is_valid() {
        return Err(ArchiveError::InvalidMagic(header.magic));
    }
    Ok(header)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kind::{DataKind, Locus};
    use stingray_hash::FileId;
    use stingray_test_utils::FlatArchiveBuilder;

    fn sample() -> (Vec<FileId>, Vec<u8>) {
        let ids = vec![
            FileId::from_names("content/a", "texture"),
            FileId::from_names("content/b", "unit"),
            FileId::from_names("content/c", "texture"),
        ];
        let built = FlatArchiveBuilder::new()
            .file(ids[0], b"main-a", b"", b"")
            .file(ids[1], b"main-b", b"stream-b", b"")
            .file(ids[2], b"main-c", b"stream-c", b"gpu-c")
            .build();
        (ids, built.main)
    }

    #[test]
    fn test_parse_tables() {
        let (ids, data) = sample();
        let archive = FlatArchive::parse(Hash::new(0xabc), &data).expect("parse archive");

        assert_eq!(archive.id, Hash::new(0xabc));
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.types.len(), 2);
        assert_eq!(archive.types[0].name, Hash::of_str("texture"));
        assert_eq!(archive.types[0].count, 2);

        let found: Vec<FileId> = archive.files.iter().map(|f| f.id).collect();
        assert_eq!(found, ids);
    }

    #[test]
    fn test_loci_slice_payloads() {
        let (_, data) = sample();
        let archive = FlatArchive::parse(Hash::new(1), &data).unwrap();

        let a = &archive.files[0];
        let main = a.locus(DataKind::Main);
        let start = main.offset as usize;
        assert_eq!(&data[start..start + main.size as usize], b"main-a");
        assert!(!a.locus(DataKind::Stream).exists());
        assert!(!a.locus(DataKind::Gpu).exists());

        let c = &archive.files[2];
        assert_eq!(c.loci()[DataKind::Gpu.index()], Locus::new(0, 5));
        assert_eq!(c.loci()[DataKind::Stream.index()], Locus::new(8, 8));
    }

    #[test]
    fn test_invalid_magic() {
        let (_, mut data) = sample();
        data[0..4].copy_from_slice(b"DSAR");
        let err = FlatArchive::parse(Hash::new(1), &data).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidMagic(m) if &m == b"DSAR"));
    }

    #[test]
    fn test_truncated_tables() {
        let (_, data) = sample();
        let cut = &data[..HEADER_SIZE as usize + 40];
        let err = FlatArchive::parse(Hash::new(1), cut).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { .. }));
    }

    #[test]
    fn test_short_header() {
        let err = FlatArchive::parse(Hash::new(1), &ARCHIVE_MAGIC).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Truncated {
                declared: 72,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_parse_tables_prefix_only() {
        let (_, data) = sample();
        let header = read_header(&mut Cursor::new(&data)).unwrap();
        let prefix = &data[..header.tables_size() as usize];
        let archive = FlatArchive::parse(Hash::new(1), prefix).unwrap();
        assert_eq!(archive.len(), 3);
    }
}
