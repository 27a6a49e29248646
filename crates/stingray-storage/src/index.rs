//! The immutable index built by [`DataDir::open`]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stingray_formats::{BundleLayout, DataKind, Locus, Manifest};
use stingray_hash::{FileId, Hash};

use crate::config::StorageConfig;

/// Which on-disk edition a data directory uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edition {
    /// Uncompressed flat archives
    Fat,
    /// `bundles.nxa` manifest plus chunked bundles
    Slim,
}

/// One occurrence of a file inside one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Archive holding the file
    pub container_id: Hash,
    /// Main, stream and GPU placement, indexed by [`DataKind::index`]
    pub loci: [Locus; 3],
}

impl FileInfo {
    /// Placement of one data kind
    pub fn locus(&self, kind: DataKind) -> Locus {
        self.loci[kind.index()]
    }

    /// Whether the file has data of this kind
    pub fn exists(&self, kind: DataKind) -> bool {
        self.locus(kind).exists()
    }
}

/// Chunk tables of a standalone hash-named bundle and its companions
#[derive(Debug, Clone, Default)]
pub struct StandaloneBundle {
    /// Layouts indexed by [`DataKind::index`]; `None` if the file is absent
    pub layouts: [Option<BundleLayout>; 3],
}

impl StandaloneBundle {
    /// Layout of the bundle holding one data kind
    pub fn layout(&self, kind: DataKind) -> Option<&BundleLayout> {
        self.layouts[kind.index()].as_ref()
    }
}

/// Manifest items making up one manifest-routed archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestArchive {
    /// Indices into [`Manifest::items`], by [`DataKind::index`]
    pub items: [Option<usize>; 3],
}

impl ManifestArchive {
    /// Manifest item holding one data kind
    pub fn item(&self, kind: DataKind) -> Option<usize> {
        self.items[kind.index()]
    }
}

/// Where a container's bytes come from
#[derive(Debug, Clone)]
pub enum ContainerSource {
    /// Fat edition: plain files named by the archive hash
    Flat,
    /// Slim edition: hash-named DSAR files outside the manifest
    Standalone(StandaloneBundle),
    /// Slim edition: logical archive routed by `bundles.nxa`
    Manifest(ManifestArchive),
}

/// Manifest and bundle chunk tables of a slim directory
#[derive(Debug, Clone)]
pub(crate) struct SlimIndex {
    pub(crate) manifest: Manifest,
    /// Layouts in manifest bundle-table order
    pub(crate) bundles: Vec<BundleLayout>,
}

/// Index of a game data directory
///
/// Built once by [`DataDir::open`] and never mutated afterwards, so it can
/// be shared between threads and read from concurrently.
#[derive(Debug)]
pub struct DataDir {
    pub(crate) config: StorageConfig,
    pub(crate) edition: Edition,
    pub(crate) containers: HashMap<Hash, Vec<FileId>>,
    pub(crate) files: HashMap<FileId, Vec<FileInfo>>,
    pub(crate) sources: HashMap<Hash, ContainerSource>,
    pub(crate) slim: Option<SlimIndex>,
}

impl DataDir {
    /// Directory the index was built from
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Configuration used to open the directory
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Detected edition
    pub fn edition(&self) -> Edition {
        self.edition
    }

    /// Number of distinct files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files were found
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All known file IDs, in no particular order
    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    /// All files with every occurrence
    pub fn files(&self) -> impl Iterator<Item = (FileId, &[FileInfo])> + '_ {
        self.files.iter().map(|(id, infos)| (*id, infos.as_slice()))
    }

    /// All archives with their member files
    pub fn containers(&self) -> impl Iterator<Item = (Hash, &[FileId])> + '_ {
        self.containers
            .iter()
            .map(|(id, members)| (*id, members.as_slice()))
    }

    /// All archive hashes
    pub fn container_ids(&self) -> impl Iterator<Item = Hash> + '_ {
        self.containers.keys().copied()
    }

    /// Members of one archive, in file-table order
    pub fn container_files(&self, id: Hash) -> Option<&[FileId]> {
        self.containers.get(&id).map(Vec::as_slice)
    }

    /// Where an archive's bytes come from
    pub fn container_source(&self, id: Hash) -> Option<&ContainerSource> {
        self.sources.get(&id)
    }

    /// First occurrence of a file; this is the one [`read`](Self::read) uses
    pub fn file_info(&self, id: FileId) -> Option<&FileInfo> {
        self.files.get(&id).and_then(|infos| infos.first())
    }

    /// Every occurrence of a file, in scan order
    pub fn file_infos(&self, id: FileId) -> &[FileInfo] {
        self.files.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Whether the file is known and has data of this kind
    pub fn exists(&self, id: FileId, kind: DataKind) -> bool {
        self.file_info(id).is_some_and(|info| info.exists(kind))
    }

    /// Path of the plain or standalone container file for one data kind
    pub(crate) fn container_path(&self, id: Hash, kind: DataKind) -> PathBuf {
        container_path(&self.config.root, id, kind)
    }
}

pub(crate) fn container_path(root: &Path, id: Hash, kind: DataKind) -> PathBuf {
    root.join(format!("{}{}", id.to_file_name(), kind.suffix()))
}
