//! Test utilities for the stingray crates
//!
//! Builders that produce the on-disk package formats byte for byte, so
//! format and storage tests can run without a game installation. The
//! libraries themselves are read-only; these writers exist only here.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::expect_used)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use binrw::BinWrite;
use stingray_hash::{FileId, Hash};
use tempfile::TempDir;

/// Flat archive magic
pub const ARCHIVE_MAGIC: [u8; 4] = [0x11, 0x00, 0x00, 0xF0];
/// Chunked bundle magic
pub const BUNDLE_MAGIC: [u8; 4] = *b"DSAR";
/// Bundle manifest magic
pub const MANIFEST_MAGIC: [u8; 4] = *b"DSAA";

/// Compression byte for raw chunks
pub const COMPRESSION_NONE: u8 = 0;
/// Compression byte for LZ4 block chunks
pub const COMPRESSION_LZ4: u8 = 3;

const BUNDLE_VERSION: u32 = 0x0001_0000;
const MANIFEST_VERSION: u32 = 1;

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_file_id(out: &mut Vec<u8>, id: FileId) {
    let mut cursor = Cursor::new(Vec::with_capacity(16));
    id.write_le(&mut cursor).expect("encode file id");
    out.extend_from_slice(cursor.get_ref());
}

fn put_hash(out: &mut Vec<u8>, hash: Hash) {
    let mut cursor = Cursor::new(Vec::with_capacity(8));
    hash.write_le(&mut cursor).expect("encode hash");
    out.extend_from_slice(cursor.get_ref());
}

/// Deterministic payload bytes, distinct per seed
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_mul(31).wrapping_add((i % 251) as u8) ^ (i / 251) as u8)
        .collect()
}

/// One file to place in a flat archive
#[derive(Debug, Clone)]
pub struct FlatFile {
    /// File identity
    pub id: FileId,
    /// Main data
    pub main: Vec<u8>,
    /// Stream data (empty = absent)
    pub stream: Vec<u8>,
    /// GPU data (empty = absent)
    pub gpu: Vec<u8>,
}

/// The three byte streams making up one flat archive
#[derive(Debug, Clone, Default)]
pub struct BuiltArchive {
    /// Main file: header, tables and main payloads
    pub main: Vec<u8>,
    /// `.stream` companion
    pub stream: Vec<u8>,
    /// `.gpu_resources` companion
    pub gpu: Vec<u8>,
}

/// Builds flat-archive bytes
#[derive(Debug, Clone, Default)]
pub struct FlatArchiveBuilder {
    files: Vec<FlatFile>,
}

impl FlatArchiveBuilder {
    /// Empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; empty slices mean the data kind is absent
    #[must_use]
    pub fn file(mut self, id: FileId, main: &[u8], stream: &[u8], gpu: &[u8]) -> Self {
        self.files.push(FlatFile {
            id,
            main: main.to_vec(),
            stream: stream.to_vec(),
            gpu: gpu.to_vec(),
        });
        self
    }

    /// Serialize header, type table, file table and payloads
    pub fn build(&self) -> BuiltArchive {
        let mut types: Vec<(Hash, u32)> = Vec::new();
        for file in &self.files {
            match types.iter_mut().find(|(kind, _)| *kind == file.id.kind) {
                Some((_, count)) => *count += 1,
                None => types.push((file.id.kind, 1)),
            }
        }

        let tables_end = 72 + 32 * types.len() + 80 * self.files.len();
        let mut main_payload = Vec::new();
        let mut stream = Vec::new();
        let mut gpu = Vec::new();
        let mut records = Vec::new();

        for (index, file) in self.files.iter().enumerate() {
            let main_offset = (tables_end + main_payload.len()) as u64;
            main_payload.extend_from_slice(&file.main);
            let stream_offset = stream.len() as u64;
            stream.extend_from_slice(&file.stream);
            let gpu_offset = gpu.len() as u64;
            gpu.extend_from_slice(&file.gpu);

            put_file_id(&mut records, file.id);
            put_u64(&mut records, main_offset);
            put_u64(&mut records, stream_offset);
            put_u64(&mut records, gpu_offset);
            put_u64(&mut records, 0);
            put_u64(&mut records, 0);
            put_u32(&mut records, file.main.len() as u32);
            put_u32(&mut records, file.stream.len() as u32);
            put_u32(&mut records, file.gpu.len() as u32);
            put_u32(&mut records, 16);
            put_u32(&mut records, 64);
            put_u32(&mut records, index as u32);
        }

        let mut main = Vec::with_capacity(tables_end + main_payload.len());
        main.extend_from_slice(&ARCHIVE_MAGIC);
        put_u32(&mut main, types.len() as u32);
        put_u32(&mut main, self.files.len() as u32);
        main.extend_from_slice(&[0u8; 60]);
        for (kind, count) in &types {
            put_u64(&mut main, 0);
            put_hash(&mut main, *kind);
            put_u32(&mut main, *count);
            put_u32(&mut main, 0);
            put_u32(&mut main, 16);
            put_u32(&mut main, 0);
        }
        main.extend_from_slice(&records);
        main.extend_from_slice(&main_payload);

        BuiltArchive { main, stream, gpu }
    }
}

/// How chunks of a bundle are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCompression {
    /// Every chunk stored raw
    None,
    /// Every chunk LZ4 compressed
    Lz4,
    /// Even chunks LZ4, odd chunks raw
    Alternating,
    /// Raw bytes tagged with an arbitrary compression byte
    Tagged(u8),
}

/// Where one payload landed inside a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Offset within the payload where this chunk starts
    pub payload_offset: u64,
    /// Uncompressed offset of the chunk within the bundle
    pub bundle_offset: u64,
}

/// DSAR bytes plus the chunk placement of every payload
#[derive(Debug, Clone)]
pub struct BuiltBundle {
    /// Complete bundle file
    pub bytes: Vec<u8>,
    /// Per payload, one entry per chunk in payload order
    pub segments: Vec<Vec<SegmentEntry>>,
}

/// Builds DSAR bundle files
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    chunk_size: usize,
    compression: ChunkCompression,
}

impl BundleBuilder {
    /// Bundle whose chunks hold at most `chunk_size` uncompressed bytes
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            compression: ChunkCompression::Lz4,
        }
    }

    /// Set the chunk encoding
    #[must_use]
    pub fn compression(mut self, compression: ChunkCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Bundle holding a single payload
    pub fn build(&self, payload: &[u8]) -> Vec<u8> {
        self.build_segments(&[payload]).bytes
    }

    /// Bundle holding several payloads; each starts on a fresh chunk
    pub fn build_segments(&self, payloads: &[&[u8]]) -> BuiltBundle {
        let mut pieces: Vec<(u64, Vec<u8>)> = Vec::new();
        let mut segments = Vec::with_capacity(payloads.len());
        let mut bundle_offset = 0u64;

        for payload in payloads {
            let mut entries = Vec::new();
            for (i, piece) in payload.chunks(self.chunk_size.max(1)).enumerate() {
                entries.push(SegmentEntry {
                    payload_offset: (i * self.chunk_size) as u64,
                    bundle_offset,
                });
                pieces.push((bundle_offset, piece.to_vec()));
                bundle_offset += piece.len() as u64;
            }
            segments.push(entries);
        }

        let header_size = 32 + 32 * pieces.len();
        let mut table = Vec::new();
        let mut data = Vec::new();

        for (i, (uncompressed_offset, piece)) in pieces.iter().enumerate() {
            let (kind, stored) = match self.compression {
                ChunkCompression::None => (COMPRESSION_NONE, piece.clone()),
                ChunkCompression::Lz4 => (COMPRESSION_LZ4, lz4_flex::block::compress(piece)),
                ChunkCompression::Alternating if i % 2 == 0 => {
                    (COMPRESSION_LZ4, lz4_flex::block::compress(piece))
                }
                ChunkCompression::Alternating => (COMPRESSION_NONE, piece.clone()),
                ChunkCompression::Tagged(kind) => (kind, piece.clone()),
            };

            put_u64(&mut table, *uncompressed_offset);
            put_u64(&mut table, (header_size + data.len()) as u64);
            put_u32(&mut table, piece.len() as u32);
            put_u32(&mut table, stored.len() as u32);
            table.push(kind);
            table.extend_from_slice(&[0u8; 7]);
            data.extend_from_slice(&stored);
        }

        let mut bytes = Vec::with_capacity(header_size + data.len());
        bytes.extend_from_slice(&BUNDLE_MAGIC);
        put_u32(&mut bytes, BUNDLE_VERSION);
        put_u32(&mut bytes, pieces.len() as u32);
        put_u32(&mut bytes, header_size as u32);
        put_u64(&mut bytes, bundle_offset);
        put_u64(&mut bytes, 0);
        bytes.extend_from_slice(&table);
        bytes.extend_from_slice(&data);

        BuiltBundle { bytes, segments }
    }
}

/// One routing entry for [`ManifestBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Offset inside the logical archive
    pub archive_offset: u64,
    /// Chunk start inside the bundle
    pub bundle_offset: u64,
    /// Index into the bundle name table
    pub bundle_index: u32,
}

/// Turn segment placement into manifest routing entries
///
/// `archive_base` is added to every payload offset, for archives whose
/// bytes are split over several bundles.
pub fn route(bundle_index: u32, segment: &[SegmentEntry], archive_base: u64) -> Vec<RouteEntry> {
    segment
        .iter()
        .map(|entry| RouteEntry {
            archive_offset: archive_base + entry.payload_offset,
            bundle_offset: entry.bundle_offset,
            bundle_index,
        })
        .collect()
}

#[derive(Debug, Clone)]
struct ItemSpec {
    filename: String,
    size: u64,
    entries: Vec<RouteEntry>,
}

/// Builds DSAA manifests and their `bundles.nxa` wrapper
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    bundles: Vec<String>,
    items: Vec<ItemSpec>,
}

impl ManifestBuilder {
    /// Empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundle file name, returning its index
    pub fn bundle(&mut self, name: &str) -> u32 {
        self.bundles.push(name.to_string());
        (self.bundles.len() - 1) as u32
    }

    /// Add a logical archive item
    pub fn item(&mut self, filename: &str, size: u64, entries: Vec<RouteEntry>) -> &mut Self {
        self.items.push(ItemSpec {
            filename: filename.to_string(),
            size,
            entries,
        });
        self
    }

    /// Serialized DSAA bytes
    pub fn build_raw(&self) -> Vec<u8> {
        let tables_end = 16 + 24 * self.items.len() + 4 * self.bundles.len();

        // Strings and entry tables follow the fixed tables
        let mut heap = Vec::new();
        let mut item_headers = Vec::new();
        for item in &self.items {
            let filename_offset = tables_end + heap.len();
            heap.extend_from_slice(item.filename.as_bytes());
            heap.push(0);
            let entries_offset = tables_end + heap.len();
            for entry in &item.entries {
                put_u64(&mut heap, entry.archive_offset);
                put_u64(&mut heap, entry.bundle_offset);
                put_u32(&mut heap, entry.bundle_index);
                put_u32(&mut heap, 0);
            }
            put_u64(&mut item_headers, item.size);
            put_u32(&mut item_headers, filename_offset as u32);
            put_u32(&mut item_headers, item.entries.len() as u32);
            put_u64(&mut item_headers, entries_offset as u64);
        }

        let mut name_offsets = Vec::new();
        for name in &self.bundles {
            put_u32(&mut name_offsets, (tables_end + heap.len()) as u32);
            heap.extend_from_slice(name.as_bytes());
            heap.push(0);
        }

        let mut out = Vec::with_capacity(tables_end + heap.len());
        out.extend_from_slice(&MANIFEST_MAGIC);
        put_u32(&mut out, MANIFEST_VERSION);
        put_u32(&mut out, self.items.len() as u32);
        put_u32(&mut out, self.bundles.len() as u32);
        out.extend_from_slice(&item_headers);
        out.extend_from_slice(&name_offsets);
        out.extend_from_slice(&heap);
        out
    }

    /// `bundles.nxa` contents: the manifest wrapped in a one-chunk bundle
    pub fn build(&self) -> Vec<u8> {
        let raw = self.build_raw();
        BundleBuilder::new(raw.len().max(1)).build(&raw)
    }
}

/// Temporary data directory
pub struct DataDirFixture {
    dir: TempDir,
}

impl DataDirFixture {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file into the directory
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes).expect("write fixture file");
        path
    }

    /// Write a fat-edition archive: `<hash>` plus non-empty companions
    pub fn write_fat_archive(&self, id: Hash, archive: &BuiltArchive) {
        let name = id.to_file_name();
        self.write(&name, &archive.main);
        if !archive.stream.is_empty() {
            self.write(&format!("{name}.stream"), &archive.stream);
        }
        if !archive.gpu.is_empty() {
            self.write(&format!("{name}.gpu_resources"), &archive.gpu);
        }
    }

    /// Write a standalone bundle set: each non-empty stream as its own DSAR file
    pub fn write_standalone_bundle(
        &self,
        id: Hash,
        archive: &BuiltArchive,
        bundle: &BundleBuilder,
    ) {
        let name = id.to_file_name();
        self.write(&name, &bundle.build(&archive.main));
        if !archive.stream.is_empty() {
            self.write(&format!("{name}.stream"), &bundle.build(&archive.stream));
        }
        if !archive.gpu.is_empty() {
            self.write(&format!("{name}.gpu_resources"), &bundle.build(&archive.gpu));
        }
    }
}

impl Default for DataDirFixture {
    fn default() -> Self {
        Self::new()
    }
}
