//! Directory scan that builds a [`DataDir`]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;

use stingray_formats::archive::{self, ArchiveError};
use stingray_formats::manifest::MANIFEST_FILE_NAME;
use stingray_formats::{BundleLayout, DataKind, FlatArchive, Manifest};
use stingray_hash::{FileId, Hash};
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::config::StorageConfig;
use crate::index::{
    ContainerSource, DataDir, Edition, FileInfo, ManifestArchive, SlimIndex, StandaloneBundle,
};
use crate::reader::{read_bundle_range, read_manifest_range};
use crate::{Result, StorageError};

impl DataDir {
    /// Scan a data directory with the default configuration
    ///
    /// `on_progress(done, total)` is called after every container, bundle
    /// or manifest processed. `cancel` is checked before each of them.
    ///
    /// # Errors
    ///
    /// - [`StorageError::InvalidPath`] if `root` is not a directory
    /// - [`StorageError::Canceled`] if `cancel` was set during the scan
    /// - [`StorageError::Io`] or [`StorageError::Format`] for the first
    ///   unreadable or malformed container; no partial index is returned
    pub fn open<P: AsRef<Path>>(
        root: P,
        cancel: &CancelFlag,
        on_progress: impl FnMut(usize, usize),
    ) -> Result<Self> {
        Self::open_with_config(StorageConfig::new(root), cancel, on_progress)
    }

    /// Scan a data directory with an explicit configuration
    ///
    /// # Errors
    ///
    /// Same as [`DataDir::open`].
    pub fn open_with_config(
        config: StorageConfig,
        cancel: &CancelFlag,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Self> {
        let listing = Listing::scan(&config.root)?;
        let mut builder = IndexBuilder::new(config);

        let (edition, slim) = if listing.contains(MANIFEST_FILE_NAME) {
            let slim = builder.load_slim(&listing, cancel, &mut on_progress)?;
            (Edition::Slim, Some(slim))
        } else {
            builder.load_fat(&listing, cancel, &mut on_progress)?;
            (Edition::Fat, None)
        };

        let dir = builder.finish(edition, slim);
        info!(
            "Opened {:?} data directory at {} ({} archives, {} files)",
            dir.edition,
            dir.root().display(),
            dir.containers.len(),
            dir.files.len()
        );
        Ok(dir)
    }
}

/// Regular file names of the data directory, read once
struct Listing {
    names: BTreeSet<String>,
}

impl Listing {
    fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(StorageError::InvalidPath(root.to_path_buf()));
        }

        let io = |e| StorageError::io(root, e);
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(root).map_err(io)? {
            let entry = entry.map_err(io)?;
            let Ok(name) = entry.file_name().into_string() else {
                debug!("Skipping non UTF-8 entry {:?}", entry.file_name());
                continue;
            };
            if name.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            names.insert(name);
        }
        Ok(Self { names })
    }

    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Extensionless names that decode to an archive hash
    fn archives(&self) -> impl Iterator<Item = (Hash, &str)> + '_ {
        self.names
            .iter()
            .filter(|name| !name.contains('.') && name.as_str() != MANIFEST_FILE_NAME)
            .filter_map(|name| match Hash::from_hex(name) {
                Ok(id) => Some((id, name.as_str())),
                Err(e) => {
                    debug!("Skipping {name}: {e}");
                    None
                }
            })
    }
}

struct IndexBuilder {
    config: StorageConfig,
    containers: HashMap<Hash, Vec<FileId>>,
    files: HashMap<FileId, Vec<FileInfo>>,
    sources: HashMap<Hash, ContainerSource>,
}

impl IndexBuilder {
    fn new(config: StorageConfig) -> Self {
        Self {
            config,
            containers: HashMap::new(),
            files: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    fn finish(self, edition: Edition, slim: Option<SlimIndex>) -> DataDir {
        DataDir {
            config: self.config,
            edition,
            containers: self.containers,
            files: self.files,
            sources: self.sources,
            slim,
        }
    }

    fn load_fat(
        &mut self,
        listing: &Listing,
        cancel: &CancelFlag,
        on_progress: &mut impl FnMut(usize, usize),
    ) -> Result<()> {
        let candidates: Vec<_> = listing.archives().collect();
        let total = candidates.len();
        on_progress(0, total);

        for (done, (id, name)) in candidates.into_iter().enumerate() {
            cancel.check()?;
            let path = self.config.root.join(name);
            let archive = FlatArchive::load(id, &mut open_buffered(&path)?)
                .map_err(|e| StorageError::format(&path, e))?;
            self.add_archive(&archive, ContainerSource::Flat);
            on_progress(done + 1, total);
        }
        Ok(())
    }

    fn load_slim(
        &mut self,
        listing: &Listing,
        cancel: &CancelFlag,
        on_progress: &mut impl FnMut(usize, usize),
    ) -> Result<SlimIndex> {
        let root = self.config.root.clone();
        let limit = self.config.max_chunk_size;

        cancel.check()?;
        let manifest_path = root.join(MANIFEST_FILE_NAME);
        let manifest = Manifest::load(&mut open_buffered(&manifest_path)?)
            .map_err(|e| StorageError::format(&manifest_path, e))?;
        debug!(
            "Loaded manifest with {} items and {} bundles",
            manifest.items.len(),
            manifest.bundles.len()
        );

        let routed = route_items(&manifest);
        let standalone: Vec<_> = if self.config.scan_standalone_bundles {
            listing
                .archives()
                .filter(|(id, name)| {
                    let known = routed.contains_key(id);
                    if known {
                        debug!("Skipping standalone {name}: already routed by the manifest");
                    }
                    !known
                })
                .collect()
        } else {
            Vec::new()
        };

        let archive_count = routed
            .values()
            .filter(|archive| archive.item(DataKind::Main).is_some())
            .count();
        let total = 1 + manifest.bundles.len() + archive_count + standalone.len();
        let mut done = 1;
        on_progress(done, total);

        let mut bundles = Vec::with_capacity(manifest.bundles.len());
        for name in &manifest.bundles {
            cancel.check()?;
            let path = root.join(name);
            let layout = load_bundle_layout(&path)?;
            debug!("Loaded bundle {name} with {} chunks", layout.len());
            bundles.push(layout);
            done += 1;
            on_progress(done, total);
        }
        let slim = SlimIndex { manifest, bundles };

        for (id, routes) in &routed {
            let Some(item) = routes
                .item(DataKind::Main)
                .and_then(|index| slim.manifest.items.get(index))
            else {
                debug!("Skipping manifest archive {id}: no main item");
                continue;
            };

            cancel.check()?;
            let path = root.join(&item.filename);
            let archive = load_archive_index(*id, &path, item.size, |offset, size| {
                read_manifest_range(&root, &slim, item, offset, size, limit)
            })?;
            self.add_archive(&archive, ContainerSource::Manifest(*routes));
            done += 1;
            on_progress(done, total);
        }

        for (id, name) in standalone {
            cancel.check()?;
            let main_path = root.join(name);
            let main = load_bundle_layout(&main_path)?;

            let mut bundle = StandaloneBundle::default();
            for kind in [DataKind::Stream, DataKind::Gpu] {
                let companion = format!("{name}{}", kind.suffix());
                if listing.contains(&companion) {
                    let layout = load_bundle_layout(&root.join(companion))?;
                    bundle.layouts[kind.index()] = Some(layout);
                }
            }

            let available = main.uncompressed_end();
            let archive = load_archive_index(id, &main_path, available, |offset, size| {
                read_bundle_range(&main_path, &main, offset, size, limit)
            })?;
            debug!("Loaded standalone bundle {name} with {} chunks", main.len());
            bundle.layouts[DataKind::Main.index()] = Some(main);
            self.add_archive(&archive, ContainerSource::Standalone(bundle));
            done += 1;
            on_progress(done, total);
        }

        Ok(slim)
    }

    fn add_archive(&mut self, archive: &FlatArchive, source: ContainerSource) {
        if self.sources.contains_key(&archive.id) {
            warn!("Archive {} found twice, keeping the first copy", archive.id);
            return;
        }

        let mut seen = HashSet::with_capacity(archive.len());
        let mut members = Vec::with_capacity(archive.len());
        for record in &archive.files {
            if !seen.insert(record.id) {
                warn!("Archive {} lists {} twice, ignoring repeat", archive.id, record.id);
                continue;
            }

            let infos = self.files.entry(record.id).or_default();
            if let Some(first) = infos.first() {
                debug!(
                    "{} is stored in both {} and {}",
                    record.id, first.container_id, archive.id
                );
            }
            infos.push(FileInfo {
                container_id: archive.id,
                loci: record.loci(),
            });
            members.push(record.id);
        }

        debug!("Indexed archive {} with {} files", archive.id, members.len());
        self.containers.insert(archive.id, members);
        self.sources.insert(archive.id, source);
    }
}

/// Group manifest items by archive hash, ordered for a deterministic scan
fn route_items(manifest: &Manifest) -> BTreeMap<Hash, ManifestArchive> {
    let mut routed: BTreeMap<Hash, ManifestArchive> = BTreeMap::new();
    for (index, item) in manifest.items.iter().enumerate() {
        let Some((id, kind)) = item.identity() else {
            debug!("Skipping manifest item {}: not an archive name", item.filename);
            continue;
        };

        let slot = &mut routed.entry(id).or_default().items[kind.index()];
        if slot.is_some() {
            warn!("Manifest lists {} twice, keeping the first", item.filename);
        } else {
            *slot = Some(index);
        }
    }
    routed
}

fn open_buffered(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| StorageError::io(path, e))
}

fn load_bundle_layout(path: &Path) -> Result<BundleLayout> {
    BundleLayout::load(&mut open_buffered(path)?).map_err(|e| StorageError::format(path, e))
}

/// Parse the flat-archive index at the start of a chunked archive
///
/// Fetches the fixed header first to learn the table size, then exactly
/// the header and tables.
fn load_archive_index(
    id: Hash,
    path: &Path,
    available: u64,
    mut read_range: impl FnMut(u64, u64) -> Result<Vec<u8>>,
) -> Result<FlatArchive> {
    if available < archive::HEADER_SIZE {
        return Err(StorageError::format(
            path,
            ArchiveError::Truncated {
                declared: archive::HEADER_SIZE,
                actual: available,
            },
        ));
    }

    let header_bytes = read_range(0, archive::HEADER_SIZE)?;
    let header = archive::read_header(&mut Cursor::new(&header_bytes))
        .map_err(|e| StorageError::format(path, e))?;

    let declared = header.tables_size();
    if declared > available {
        return Err(StorageError::format(
            path,
            ArchiveError::Truncated {
                declared,
                actual: available,
            },
        ));
    }

    let tables = read_range(0, declared)?;
    FlatArchive::parse(id, &tables).map_err(|e| StorageError::format(path, e))
}
