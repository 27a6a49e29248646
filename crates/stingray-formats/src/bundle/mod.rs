//! DSAR chunked bundle format
//!
//! Slim-edition bundles are split into chunks that are stored raw or as
//! single LZ4 blocks. The chunk table is ordered by uncompressed offset so
//! any byte of the uncompressed space can be located by binary search and
//! decoded without touching the rest of the file.
//!
//! ```text
//! +-----------------+ 0
//! | BundleHeader    | 32 bytes
//! +-----------------+
//! | Chunk * N       | 32 bytes each
//! +-----------------+ header_size
//! | stored chunks   |
//! +-----------------+
//! ```

mod chunk;
mod error;

pub use chunk::{
    BUNDLE_MAGIC, BundleHeader, CHUNK_RECORD_SIZE, Chunk, CompressionKind, HEADER_SIZE,
};
pub use error::{BundleError, BundleResult};

use binrw::BinRead;
use binrw::io::{Read, Seek, SeekFrom};

/// Default upper bound for a single chunk's stored or decoded size (256 MiB)
///
/// Checked before allocating so a corrupt table cannot request an
/// arbitrarily large buffer.
pub const MAX_CHUNK_SIZE: usize = 256 * 1024 * 1024;

/// Chunk table of one bundle file
#[derive(Debug, Clone)]
pub struct BundleLayout {
    /// Bundle header
    pub header: BundleHeader,
    /// Chunks ascending by uncompressed offset
    pub chunks: Vec<Chunk>,
}

impl BundleLayout {
    /// Read the header and chunk table from the start of `reader`
    pub fn load<R: Read + Seek>(reader: &mut R) -> BundleResult<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = BundleHeader::read(reader)?;
        if header.magic != BUNDLE_MAGIC {
            return Err(BundleError::InvalidMagic(header.magic));
        }

        let required = HEADER_SIZE + u64::from(header.chunk_count) * CHUNK_RECORD_SIZE;
        if u64::from(header.header_size) < required {
            return Err(BundleError::InvalidHeaderSize {
                declared: header.header_size,
                required,
            });
        }

        let chunks = (0..header.chunk_count)
            .map(|_| Chunk::read(reader))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(index) = chunks
            .windows(2)
            .position(|pair| pair[1].uncompressed_offset < pair[0].uncompressed_offset)
        {
            return Err(BundleError::UnsortedChunks { index: index + 1 });
        }

        // Chunks tile [0, uncompressed_size) with no gaps
        let mut end = 0u64;
        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.uncompressed_offset != end {
                return Err(BundleError::ChunkGap {
                    index,
                    expected: end,
                });
            }
            end = chunk
                .uncompressed_offset
                .checked_add(u64::from(chunk.uncompressed_size))
                .filter(|&chunk_end| chunk_end <= header.uncompressed_size)
                .ok_or(BundleError::ChunkOutOfBounds {
                    index,
                    size: header.uncompressed_size,
                })?;
        }

        Ok(Self { header, chunks })
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the bundle has no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// End of the uncompressed space covered by the chunk table
    pub fn uncompressed_end(&self) -> u64 {
        self.chunks.last().map_or(0, Chunk::uncompressed_end)
    }

    /// Index of the chunk holding uncompressed `offset`
    ///
    /// Returns the exact match if a chunk starts at `offset`, otherwise the
    /// closest chunk starting before it. An offset past the last chunk's
    /// span yields `None`.
    pub fn find_chunk(&self, offset: u64) -> Option<usize> {
        let index = self
            .chunks
            .partition_point(|c| c.uncompressed_offset <= offset)
            .checked_sub(1)?;
        let is_last = index + 1 == self.chunks.len();
        (!is_last || offset < self.chunks[index].uncompressed_end()).then_some(index)
    }

    /// Index of the chunk starting exactly at `offset`
    ///
    /// Manifest entries always point at chunk starts; anything else means
    /// the manifest and bundle disagree.
    pub fn find_chunk_for_entry(&self, offset: u64) -> BundleResult<usize> {
        self.chunks
            .binary_search_by_key(&offset, |c| c.uncompressed_offset)
            .map_err(|_| BundleError::ChunkNotFound { offset })
    }
}

/// Read the chunk table of a bundle
pub fn load_layout<R: Read + Seek>(reader: &mut R) -> BundleResult<BundleLayout> {
    BundleLayout::load(reader)
}

/// Read and decode one chunk with the default size limit
pub fn read_chunk<R: Read + Seek>(reader: &mut R, chunk: &Chunk) -> BundleResult<Vec<u8>> {
    read_chunk_limited(reader, chunk, MAX_CHUNK_SIZE)
}

/// Read and decode one chunk, refusing chunks larger than `limit`
pub fn read_chunk_limited<R: Read + Seek>(
    reader: &mut R,
    chunk: &Chunk,
    limit: usize,
) -> BundleResult<Vec<u8>> {
    let compressed_size = chunk.compressed_size as usize;
    let uncompressed_size = chunk.uncompressed_size as usize;
    for size in [uncompressed_size, compressed_size] {
        if size > limit {
            return Err(BundleError::ChunkTooLarge { size, limit });
        }
    }

    if let CompressionKind::Unknown(tag) = chunk.compression {
        return Err(BundleError::UnsupportedCompression(tag));
    }

    reader.seek(SeekFrom::Start(chunk.compressed_offset))?;
    let mut stored = vec![0u8; compressed_size];
    reader.read_exact(&mut stored)?;

    match chunk.compression {
        CompressionKind::Lz4 => {
            let decoded = lz4_flex::block::decompress(&stored, uncompressed_size)?;
            if decoded.len() != uncompressed_size {
                return Err(BundleError::SizeMismatch {
                    expected: uncompressed_size,
                    actual: decoded.len(),
                });
            }
            Ok(decoded)
        }
        _ => Ok(stored),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;
    use stingray_test_utils::{BundleBuilder, ChunkCompression, payload};

    fn layout_of(bytes: &[u8]) -> BundleLayout {
        load_layout(&mut Cursor::new(bytes)).expect("load layout")
    }

    #[test]
    fn test_load_layout() {
        let data = payload(1, 1000);
        let bytes = BundleBuilder::new(256).build(&data);
        let layout = layout_of(&bytes);

        assert_eq!(layout.len(), 4);
        assert_eq!(layout.header.uncompressed_size, 1000);
        assert_eq!(layout.uncompressed_end(), 1000);
        let starts: Vec<u64> = layout
            .chunks
            .iter()
            .map(|c| c.uncompressed_offset)
            .collect();
        assert_eq!(starts, vec![0, 256, 512, 768]);
        for chunk in &layout.chunks {
            assert_eq!(chunk.compression, CompressionKind::Lz4);
        }
    }

    #[test]
    fn test_read_chunks_concatenate_to_payload() {
        let data = payload(2, 1500);
        for mode in [
            ChunkCompression::None,
            ChunkCompression::Lz4,
            ChunkCompression::Alternating,
        ] {
            let bytes = BundleBuilder::new(400).compression(mode).build(&data);
            let layout = layout_of(&bytes);
            let mut cursor = Cursor::new(&bytes);

            let mut out = Vec::new();
            for chunk in &layout.chunks {
                out.extend(read_chunk(&mut cursor, chunk).unwrap());
            }
            assert_eq!(out, data, "mode {mode:?}");
        }
    }

    #[test]
    fn test_reread_is_identical() {
        let data = payload(3, 700);
        let bytes = BundleBuilder::new(700).build(&data);
        let layout = layout_of(&bytes);
        let mut cursor = Cursor::new(&bytes);

        let first = read_chunk(&mut cursor, &layout.chunks[0]).unwrap();
        let second = read_chunk(&mut cursor, &layout.chunks[0]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_compression() {
        let bytes = BundleBuilder::new(64)
            .compression(ChunkCompression::Tagged(2))
            .build(&payload(4, 100));
        let layout = layout_of(&bytes);
        assert_eq!(layout.chunks[0].compression, CompressionKind::Unknown(2));

        let err = read_chunk(&mut Cursor::new(&bytes), &layout.chunks[0]).unwrap_err();
        assert!(matches!(err, BundleError::UnsupportedCompression(2)));
    }

    #[test]
    fn test_corrupt_lz4_block() {
        let mut bytes = BundleBuilder::new(512).build(&payload(5, 512));
        let layout = layout_of(&bytes);
        let chunk = layout.chunks[0];

        // Truncate the stored block by shrinking its declared size
        let mut short = chunk;
        short.compressed_size /= 2;
        assert!(read_chunk(&mut Cursor::new(&bytes), &short).is_err());

        // Scramble the block contents
        let start = chunk.compressed_offset as usize;
        for byte in &mut bytes[start..start + chunk.compressed_size as usize] {
            *byte = 0xFF;
        }
        assert!(read_chunk(&mut Cursor::new(&bytes), &chunk).is_err());
    }

    #[test]
    fn test_chunk_limit() {
        let bytes = BundleBuilder::new(1024).build(&payload(6, 1024));
        let layout = layout_of(&bytes);
        let err = read_chunk_limited(&mut Cursor::new(&bytes), &layout.chunks[0], 100)
            .unwrap_err();
        assert!(matches!(
            err,
            BundleError::ChunkTooLarge {
                size: 1024,
                limit: 100
            }
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = BundleBuilder::new(16).build(&payload(7, 32));
        bytes[0..4].copy_from_slice(b"DSAA");
        let err = load_layout(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, BundleError::InvalidMagic(m) if &m == b"DSAA"));
    }

    #[test]
    fn test_header_size_too_small() {
        let mut bytes = BundleBuilder::new(16).build(&payload(8, 64));
        bytes[12..16].copy_from_slice(&40u32.to_le_bytes());
        let err = load_layout(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            BundleError::InvalidHeaderSize {
                declared: 40,
                required: 160
            }
        ));
    }

    #[test]
    fn test_unsorted_chunks_rejected() {
        let mut bytes = BundleBuilder::new(16).build(&payload(9, 48));
        // Swap the uncompressed offsets of chunk 1 and chunk 2
        let first = HEADER_SIZE as usize + CHUNK_RECORD_SIZE as usize;
        let second = first + CHUNK_RECORD_SIZE as usize;
        let a: [u8; 8] = bytes[first..first + 8].try_into().unwrap();
        let b: [u8; 8] = bytes[second..second + 8].try_into().unwrap();
        bytes[first..first + 8].copy_from_slice(&b);
        bytes[second..second + 8].copy_from_slice(&a);

        let err = load_layout(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, BundleError::UnsortedChunks { index: 2 }));
    }

    fn patch_chunk(bytes: &mut [u8], index: usize, offset: u64) {
        let at = HEADER_SIZE as usize + index * CHUNK_RECORD_SIZE as usize;
        bytes[at..at + 8].copy_from_slice(&offset.to_le_bytes());
    }

    #[test]
    fn test_chunk_near_offset_limit_rejected() {
        let mut bytes = BundleBuilder::new(64).build(&payload(11, 64));
        patch_chunk(&mut bytes, 0, u64::MAX - 10);
        bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());

        let err = load_layout(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            BundleError::ChunkGap {
                index: 0,
                expected: 0
            }
        ));
    }

    #[test]
    fn test_chunk_past_declared_size_rejected() {
        let mut bytes = BundleBuilder::new(16).build(&payload(12, 48));
        bytes[16..24].copy_from_slice(&40u64.to_le_bytes());

        let err = load_layout(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            BundleError::ChunkOutOfBounds { index: 2, size: 40 }
        ));
    }

    #[test]
    fn test_chunk_gap_rejected() {
        let mut bytes = BundleBuilder::new(16).build(&payload(13, 48));
        patch_chunk(&mut bytes, 2, 40);

        let err = load_layout(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            BundleError::ChunkGap {
                index: 2,
                expected: 32
            }
        ));
    }

    #[test]
    fn test_find_chunk_for_entry() {
        let bytes = BundleBuilder::new(100).build(&payload(10, 350));
        let layout = layout_of(&bytes);
        assert_eq!(layout.find_chunk_for_entry(200).unwrap(), 2);
        assert!(matches!(
            layout.find_chunk_for_entry(150),
            Err(BundleError::ChunkNotFound { offset: 150 })
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Every offset maps to the chunk whose span contains it
            #[test]
            fn find_chunk_contains_offset(
                total in 1usize..4000,
                chunk_size in 1usize..600,
                pick in any::<prop::sample::Index>(),
            ) {
                let bytes = BundleBuilder::new(chunk_size)
                    .compression(ChunkCompression::None)
                    .build(&payload(0, total));
                let layout = layout_of(&bytes);
                let offset = pick.index(total) as u64;

                let index = layout.find_chunk(offset).unwrap();
                let chunk = layout.chunks[index];
                prop_assert!(chunk.uncompressed_offset <= offset);
                prop_assert!(offset < chunk.uncompressed_end());
                if let Some(next) = layout.chunks.get(index + 1) {
                    prop_assert!(offset < next.uncompressed_offset);
                }
                prop_assert_eq!(layout.find_chunk(total as u64), None);
            }
        }
    }
}
