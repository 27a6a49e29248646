//! Byte-range reads from flat files, standalone bundles and manifest routes
//!
//! Every read opens its own file handles, so concurrent reads share nothing
//! but the immutable index. Chunked reads decode chunks in order and keep
//! only the requested bytes, so memory stays at the range size plus one
//! decoded chunk.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use stingray_formats::bundle::read_chunk_limited;
use stingray_formats::{ArchiveItem, BundleError, BundleLayout, DataKind, Locus};
use stingray_hash::FileId;
use tracing::trace;

use crate::index::{ContainerSource, DataDir, SlimIndex};
use crate::{Result, StorageError};

impl DataDir {
    /// Read one data kind of a file
    ///
    /// Uses the first occurrence if the file is stored more than once.
    ///
    /// # Errors
    ///
    /// - [`StorageError::FileNotExist`] if no container lists the file
    /// - [`StorageError::DataKindNotExist`] if the file has no data of this kind
    /// - [`StorageError::Io`] or [`StorageError::Format`] if the container
    ///   cannot be read or is corrupt
    pub fn read(&self, id: FileId, kind: DataKind) -> Result<Vec<u8>> {
        let info = self.file_info(id).ok_or(StorageError::FileNotExist(id))?;
        let locus = info.locus(kind);
        if !locus.exists() {
            return Err(StorageError::DataKindNotExist { id, kind });
        }

        let container = info.container_id;
        let missing = || StorageError::ContainerNotFound {
            id: container,
            kind,
        };

        match self.sources.get(&container).ok_or_else(missing)? {
            ContainerSource::Flat => read_flat(&self.container_path(container, kind), locus),
            ContainerSource::Standalone(bundle) => {
                let layout = bundle.layout(kind).ok_or_else(missing)?;
                read_bundle_range(
                    &self.container_path(container, kind),
                    layout,
                    locus.offset,
                    u64::from(locus.size),
                    self.config.max_chunk_size,
                )
            }
            ContainerSource::Manifest(archive) => {
                let slim = self.slim.as_ref().ok_or_else(missing)?;
                let item = archive
                    .item(kind)
                    .and_then(|index| slim.manifest.items.get(index))
                    .ok_or_else(missing)?;
                read_manifest_range(
                    self.root(),
                    slim,
                    item,
                    locus.offset,
                    u64::from(locus.size),
                    self.config.max_chunk_size,
                )
            }
        }
    }

    /// Read all three data kinds of a file
    ///
    /// Absent kinds are `None` rather than an error.
    ///
    /// # Errors
    ///
    /// [`StorageError::FileNotExist`] for an unknown file, or the first
    /// I/O or format error hit while reading a present kind.
    pub fn read_triad(&self, id: FileId) -> Result<[Option<Vec<u8>>; 3]> {
        if self.file_info(id).is_none() {
            return Err(StorageError::FileNotExist(id));
        }

        let mut out = [None, None, None];
        for kind in DataKind::ALL {
            out[kind.index()] = match self.read(id, kind) {
                Ok(bytes) => Some(bytes),
                Err(StorageError::DataKindNotExist { .. }) => None,
                Err(e) => return Err(e),
            };
        }
        Ok(out)
    }
}

/// Seek and read from an uncompressed file
pub(crate) fn read_flat(path: &Path, locus: Locus) -> Result<Vec<u8>> {
    let io = |e| StorageError::io(path, e);
    let mut file = File::open(path).map_err(io)?;
    file.seek(SeekFrom::Start(locus.offset)).map_err(io)?;

    let mut buffer = Vec::new();
    file.take(u64::from(locus.size))
        .read_to_end(&mut buffer)
        .map_err(io)?;
    if buffer.len() != locus.size as usize {
        return Err(io(ErrorKind::UnexpectedEof.into()));
    }
    Ok(buffer)
}

/// Read `size` bytes at uncompressed `offset` of a single bundle
pub(crate) fn read_bundle_range(
    path: &Path,
    layout: &BundleLayout,
    offset: u64,
    size: u64,
    limit: usize,
) -> Result<Vec<u8>> {
    let out_of_bounds = || {
        StorageError::format(
            path,
            BundleError::RangeOutOfBounds {
                offset,
                requested: size,
            },
        )
    };

    if offset.saturating_add(size) > layout.uncompressed_end() {
        return Err(out_of_bounds());
    }
    let first = layout.find_chunk(offset).ok_or_else(out_of_bounds)?;
    let skip = offset - layout.chunks[first].uncompressed_offset;

    let mut reader = BufReader::new(File::open(path).map_err(|e| StorageError::io(path, e))?);
    let mut range = RangeBuffer::new(skip, size);

    for chunk in &layout.chunks[first..] {
        if range.is_full() {
            break;
        }
        let data = read_chunk_limited(&mut reader, chunk, limit)
            .map_err(|e| StorageError::format(path, e))?;
        trace!(
            "Decoded chunk at {} ({} -> {} bytes)",
            chunk.uncompressed_offset, chunk.compressed_size, chunk.uncompressed_size
        );
        range.push(&data);
    }

    range.finish().ok_or_else(out_of_bounds)
}

/// Read `size` bytes at `offset` of a manifest-routed logical archive
///
/// Entries are walked in archive order. Each contributes the bytes up to
/// the next entry (or the item's end), decoded from consecutive chunks of
/// its bundle starting at the chunk it names.
pub(crate) fn read_manifest_range(
    root: &Path,
    slim: &SlimIndex,
    item: &ArchiveItem,
    offset: u64,
    size: u64,
    limit: usize,
) -> Result<Vec<u8>> {
    let item_path = root.join(&item.filename);
    let out_of_bounds = || {
        StorageError::format(
            &item_path,
            BundleError::RangeOutOfBounds {
                offset,
                requested: size,
            },
        )
    };

    if offset.saturating_add(size) > item.size {
        return Err(out_of_bounds());
    }
    let first = item.find_entry(offset).ok_or_else(out_of_bounds)?;
    let mut range = RangeBuffer::new(offset - item.entries[first].archive_offset, size);
    let mut open: Option<(u32, BufReader<File>)> = None;

    for (index, entry) in item.entries.iter().enumerate().skip(first) {
        if range.is_full() {
            break;
        }

        let bundle_index = entry.bundle_index as usize;
        let bundle_path = root.join(&slim.manifest.bundles[bundle_index]);
        let layout = &slim.bundles[bundle_index];
        let start = layout
            .find_chunk_for_entry(entry.uncompressed_bundle_offset)
            .map_err(|e| StorageError::format(&bundle_path, e))?;

        let mut reader = match open.take() {
            Some((current, reader)) if current == entry.bundle_index => reader,
            _ => BufReader::new(
                File::open(&bundle_path).map_err(|e| StorageError::io(&bundle_path, e))?,
            ),
        };

        let span = item.entry_end(index).saturating_sub(entry.archive_offset);
        let mut taken = 0u64;
        for chunk in &layout.chunks[start..] {
            if taken >= span || range.is_full() {
                break;
            }

            let wanted = (span - taken).min(u64::from(chunk.uncompressed_size));
            if range.skip_whole(wanted) {
                taken += wanted;
                continue;
            }

            let data = read_chunk_limited(&mut reader, chunk, limit)
                .map_err(|e| StorageError::format(&bundle_path, e))?;
            trace!(
                "Decoded {} chunk at {} for {}",
                slim.manifest.bundles[bundle_index], chunk.uncompressed_offset, item.filename
            );
            let usable = wanted.min(data.len() as u64) as usize;
            range.push(&data[..usable]);
            taken += usable as u64;
        }

        if taken < span && !range.is_full() {
            return Err(out_of_bounds());
        }
        open = Some((entry.bundle_index, reader));
    }

    range.finish().ok_or_else(out_of_bounds)
}

/// Collects a range out of a sequence of decoded chunks
struct RangeBuffer {
    skip: u64,
    size: usize,
    out: Vec<u8>,
}

impl RangeBuffer {
    /// Keep `size` bytes after dropping the first `skip`
    fn new(skip: u64, size: u64) -> Self {
        let size = size as usize;
        Self {
            skip,
            size,
            out: Vec::with_capacity(size),
        }
    }

    fn is_full(&self) -> bool {
        self.out.len() >= self.size
    }

    /// Drop a whole chunk without decoding it if it lies entirely before
    /// the range
    fn skip_whole(&mut self, len: u64) -> bool {
        if len > 0 && self.skip >= len {
            self.skip -= len;
            true
        } else {
            false
        }
    }

    fn push(&mut self, data: &[u8]) {
        let drop = self.skip.min(data.len() as u64) as usize;
        self.skip -= drop as u64;
        let data = &data[drop..];

        let take = data.len().min(self.size - self.out.len());
        self.out.extend_from_slice(&data[..take]);
    }

    /// The collected range, or `None` if the chunks ran out first
    fn finish(self) -> Option<Vec<u8>> {
        (self.out.len() == self.size).then_some(self.out)
    }
}
