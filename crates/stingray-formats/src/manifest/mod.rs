//! DSAA bundle manifest
//!
//! The slim edition packs many logical archives into a few large bundle
//! files. The manifest says, for each logical archive, which bundle and
//! which chunk holds each span of its bytes. It is stored in `bundles.nxa`,
//! itself a DSAR bundle with exactly one chunk.
//!
//! ```text
//! +---------------------------+ 0
//! | ManifestHeader            | 16 bytes
//! +---------------------------+
//! | ArchiveItemHeader * N     | 24 bytes each
//! +---------------------------+
//! | bundle name offset * B    | u32 each
//! +---------------------------+
//! | names and entry tables    | located by the offsets above
//! +---------------------------+
//! ```

mod entry;
mod error;

pub use entry::{
    ArchiveItem, ArchiveItemHeader, ENTRY_SIZE, HEADER_SIZE, ITEM_HEADER_SIZE, MANIFEST_MAGIC,
    ManifestEntry, ManifestHeader,
};
pub use error::{ManifestError, ManifestResult};

use binrw::BinRead;
use binrw::io::{Cursor, Read, Seek, SeekFrom};

use crate::bundle::{BundleLayout, read_chunk};

/// Name of the manifest file in a slim data directory
pub const MANIFEST_FILE_NAME: &str = "bundles.nxa";

/// Strings are scanned for their terminator this many bytes at a time
const STRING_READ_CHUNK: usize = 32;

/// Parsed slim-edition index
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Manifest header
    pub header: ManifestHeader,
    /// Logical archives in table order
    pub items: Vec<ArchiveItem>,
    /// Bundle file names, addressed by [`ManifestEntry::bundle_index`]
    pub bundles: Vec<String>,
}

impl Manifest {
    /// Load from a `bundles.nxa` stream
    ///
    /// Decodes the wrapper's single chunk, then parses the manifest inside.
    pub fn load<R: Read + Seek>(reader: &mut R) -> ManifestResult<Self> {
        let layout = BundleLayout::load(reader)?;
        let [chunk] = layout.chunks.as_slice() else {
            return Err(ManifestError::WrapperChunkCount(layout.chunks.len()));
        };
        let data = read_chunk(reader, chunk)?;
        Self::parse(&data)
    }

    /// Parse unwrapped manifest bytes
    pub fn parse(data: &[u8]) -> ManifestResult<Self> {
        let len = data.len() as u64;
        let mut reader = Cursor::new(data);

        ensure_fits("header", 0, HEADER_SIZE, len)?;
        let header = ManifestHeader::read(&mut reader)?;
        if header.magic != MANIFEST_MAGIC {
            return Err(ManifestError::InvalidMagic(header.magic));
        }

        let item_table = u64::from(header.item_count) * ITEM_HEADER_SIZE;
        let name_table = u64::from(header.bundle_count) * 4;
        ensure_fits("item table", HEADER_SIZE, item_table + name_table, len)?;

        let item_headers = (0..header.item_count)
            .map(|_| ArchiveItemHeader::read(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;
        let name_offsets = (0..header.bundle_count)
            .map(|_| u32::read_le(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        let bundles = name_offsets
            .iter()
            .map(|&offset| read_string_at(&mut reader, u64::from(offset)))
            .collect::<ManifestResult<Vec<_>>>()?;

        let mut items = Vec::with_capacity(item_headers.len());
        for item_header in &item_headers {
            let item = read_item(&mut reader, item_header, len)?;
            validate_item(&item, bundles.len())?;
            items.push(item);
        }

        Ok(Self {
            header,
            items,
            bundles,
        })
    }

    /// Look up an item by file name
    pub fn item(&self, filename: &str) -> Option<&ArchiveItem> {
        self.items.iter().find(|item| item.filename == filename)
    }
}

fn read_item(
    reader: &mut Cursor<&[u8]>,
    header: &ArchiveItemHeader,
    len: u64,
) -> ManifestResult<ArchiveItem> {
    let filename = read_string_at(reader, u64::from(header.filename_offset))?;

    let table = u64::from(header.entry_count) * ENTRY_SIZE;
    ensure_fits("entry table", header.entries_offset, table, len)?;
    reader.seek(SeekFrom::Start(header.entries_offset))?;
    let entries = (0..header.entry_count)
        .map(|_| ManifestEntry::read(reader))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ArchiveItem {
        filename,
        size: header.size,
        entries,
    })
}

fn validate_item(item: &ArchiveItem, bundle_count: usize) -> ManifestResult<()> {
    if item
        .entries
        .windows(2)
        .any(|pair| pair[1].archive_offset < pair[0].archive_offset)
    {
        return Err(ManifestError::UnsortedEntries {
            item: item.filename.clone(),
        });
    }
    if let Some(entry) = item
        .entries
        .iter()
        .find(|e| e.bundle_index as usize >= bundle_count)
    {
        return Err(ManifestError::BundleIndexOutOfRange {
            item: item.filename.clone(),
            index: entry.bundle_index,
            count: bundle_count,
        });
    }
    Ok(())
}

fn ensure_fits(what: &'static str, offset: u64, declared: u64, len: u64) -> ManifestResult<()> {
    let end = offset.checked_add(declared);
    if end.is_none_or(|end| end > len) {
        return Err(ManifestError::Truncated {
            what,
            offset,
            declared,
            actual: len.saturating_sub(offset),
        });
    }
    Ok(())
}

/// Seek to `offset` and read a NUL-terminated string
pub fn read_string_at<R: Read + Seek>(reader: &mut R, offset: u64) -> ManifestResult<String> {
    reader.seek(SeekFrom::Start(offset))?;
    read_cstring(reader, offset)
}

/// Read a NUL-terminated string in fixed-size pieces
///
/// The terminator may land anywhere in a piece, including its first or
/// last byte; bytes after it are ignored.
fn read_cstring<R: Read>(reader: &mut R, offset: u64) -> ManifestResult<String> {
    let mut bytes = Vec::new();
    let mut buf = [0u8; STRING_READ_CHUNK];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            return Err(ManifestError::UnterminatedString { offset });
        }
        if let Some(end) = buf[..read].iter().position(|&b| b == 0) {
            bytes.extend_from_slice(&buf[..end]);
            break;
        }
        bytes.extend_from_slice(&buf[..read]);
    }
    String::from_utf8(bytes).map_err(|source| ManifestError::InvalidName { offset, source })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kind::DataKind;
    use pretty_assertions::assert_eq;
    use stingray_hash::Hash;
    use stingray_test_utils::{BundleBuilder, ManifestBuilder, RouteEntry, payload, route};

    fn entry(archive_offset: u64, bundle_offset: u64, bundle_index: u32) -> RouteEntry {
        RouteEntry {
            archive_offset,
            bundle_offset,
            bundle_index,
        }
    }

    fn sample() -> ManifestBuilder {
        let mut builder = ManifestBuilder::new();
        let b0 = builder.bundle("bundles.00.nxa");
        let b1 = builder.bundle("bundles.01.nxa");
        builder
            .item(
                "9ba626afa44a3aa3",
                300,
                vec![entry(0, 0, b0), entry(100, 100, b0), entry(200, 0, b1)],
            )
            .item("9ba626afa44a3aa3.stream", 50, vec![entry(0, 300, b0)])
            .item(
                "9ba626afa44a3aa3.gpu_resources",
                10,
                vec![entry(0, 100, b1)],
            );
        builder
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(&sample().build_raw()).expect("parse manifest");

        assert_eq!(manifest.bundles, vec!["bundles.00.nxa", "bundles.01.nxa"]);
        assert_eq!(manifest.items.len(), 3);

        let main = &manifest.items[0];
        assert_eq!(main.filename, "9ba626afa44a3aa3");
        assert_eq!(main.size, 300);
        assert_eq!(main.entries.len(), 3);
        assert_eq!(main.entries[2].bundle_index, 1);
        assert_eq!(main.entries[1].uncompressed_bundle_offset, 100);
        assert_eq!(
            main.identity(),
            Some((Hash::new(0x9ba6_26af_a44a_3aa3), DataKind::Main))
        );

        let stream = manifest.item("9ba626afa44a3aa3.stream").unwrap();
        assert_eq!(
            stream.identity(),
            Some((Hash::new(0x9ba6_26af_a44a_3aa3), DataKind::Stream))
        );
    }

    #[test]
    fn test_load_through_wrapper() {
        let wrapped = sample().build();
        let manifest = Manifest::load(&mut Cursor::new(&wrapped)).unwrap();
        assert_eq!(manifest.items.len(), 3);
        assert_eq!(manifest.header.bundle_count, 2);
    }

    #[test]
    fn test_wrapper_must_have_one_chunk() {
        let raw = sample().build_raw();
        let wrapped = BundleBuilder::new(raw.len() / 2).build(&raw);
        let err = Manifest::load(&mut Cursor::new(&wrapped)).unwrap_err();
        assert!(matches!(err, ManifestError::WrapperChunkCount(n) if n > 1));
    }

    #[test]
    fn test_invalid_magic() {
        let mut raw = sample().build_raw();
        raw[0..4].copy_from_slice(b"DSAR");
        assert!(matches!(
            Manifest::parse(&raw),
            Err(ManifestError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_truncated_manifest() {
        let raw = sample().build_raw();
        // Cut away the bundle names and the tail of the last entry table
        let cut = &raw[..raw.len() - 40];
        assert!(matches!(
            Manifest::parse(cut),
            Err(ManifestError::Truncated { .. } | ManifestError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn test_bundle_index_out_of_range() {
        let mut builder = ManifestBuilder::new();
        builder.bundle("only.nxa");
        builder.item("0000000000000001", 10, vec![entry(0, 0, 5)]);
        assert!(matches!(
            Manifest::parse(&builder.build_raw()),
            Err(ManifestError::BundleIndexOutOfRange { index: 5, count: 1, .. })
        ));
    }

    #[test]
    fn test_unsorted_entries() {
        let mut builder = ManifestBuilder::new();
        builder.bundle("only.nxa");
        builder.item(
            "0000000000000001",
            200,
            vec![entry(100, 100, 0), entry(0, 0, 0)],
        );
        assert!(matches!(
            Manifest::parse(&builder.build_raw()),
            Err(ManifestError::UnsortedEntries { .. })
        ));
    }

    #[test]
    fn test_cstring_terminator_positions() {
        // Terminator at the first byte, mid-piece, last byte of a piece,
        // first byte of the next piece, and deep into a later piece
        for len in [0usize, 5, 31, 32, 33, 63, 64, 100] {
            let name = "x".repeat(len);
            let mut data = name.as_bytes().to_vec();
            data.push(0);
            data.extend_from_slice(b"trailing garbage");

            let got = read_string_at(&mut Cursor::new(&data), 0).unwrap();
            assert_eq!(got, name, "length {len}");
        }
    }

    #[test]
    fn test_cstring_at_end_of_data() {
        let data = b"abc\0";
        assert_eq!(read_string_at(&mut Cursor::new(&data[..]), 0).unwrap(), "abc");

        let unterminated = b"abc";
        assert!(matches!(
            read_string_at(&mut Cursor::new(&unterminated[..]), 0),
            Err(ManifestError::UnterminatedString { offset: 0 })
        ));
    }

    #[test]
    fn test_find_entry() {
        let manifest = Manifest::parse(&sample().build_raw()).unwrap();
        let main = &manifest.items[0];

        assert_eq!(main.find_entry(0), Some(0));
        assert_eq!(main.find_entry(99), Some(0));
        assert_eq!(main.find_entry(100), Some(1));
        assert_eq!(main.find_entry(250), Some(2));
        assert_eq!(main.find_entry(299), Some(2));
        assert_eq!(main.find_entry(300), None);
        assert_eq!(main.entry_end(1), 200);
        assert_eq!(main.entry_end(2), 300);
    }

    #[test]
    fn test_identity_rejects_foreign_names() {
        let item = ArchiveItem {
            filename: "patch_0.nxa".to_string(),
            size: 0,
            entries: Vec::new(),
        };
        assert_eq!(item.identity(), None);
    }

    #[test]
    fn test_routes_from_real_bundle() {
        let data = payload(1, 1000);
        let built = BundleBuilder::new(256).build_segments(&[&data]);
        let mut builder = ManifestBuilder::new();
        let index = builder.bundle("bundles.00.nxa");
        builder.item("0000000000000002", 1000, route(index, &built.segments[0], 0));

        let manifest = Manifest::parse(&builder.build_raw()).unwrap();
        let offsets: Vec<u64> = manifest.items[0]
            .entries
            .iter()
            .map(|e| e.archive_offset)
            .collect();
        assert_eq!(offsets, vec![0, 256, 512, 768]);
    }
}
