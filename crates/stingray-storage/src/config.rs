//! Configuration for opening a data directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stingray_formats::bundle::MAX_CHUNK_SIZE;

/// Configuration for [`DataDir::open_with_config`](crate::DataDir::open_with_config)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Game data directory
    pub root: PathBuf,

    /// Index hash-named DSAR bundles that the manifest does not route
    /// (slim edition only)
    pub scan_standalone_bundles: bool,

    /// Largest chunk, stored or decoded, that will be read (in bytes)
    pub max_chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            scan_standalone_bundles: true,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration for the given data directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the data directory
    #[must_use]
    pub fn with_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    /// Enable or disable indexing of standalone bundles
    #[must_use]
    pub const fn with_standalone_bundles(mut self, enable: bool) -> Self {
        self.scan_standalone_bundles = enable;
        self
    }

    /// Set the chunk size limit
    #[must_use]
    pub const fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }
}
