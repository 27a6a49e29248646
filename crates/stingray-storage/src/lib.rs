//! Read-only storage layer for Stingray game data directories.
//!
//! A data directory comes in one of two editions:
//!
//! - **Fat**: one uncompressed flat archive per archive hash, named by the
//!   hash, with optional `.stream` and `.gpu_resources` companions
//! - **Slim**: a `bundles.nxa` manifest routing logical archives into a few
//!   large chunked bundles, plus optional standalone hash-named bundles
//!
//! [`DataDir::open`] scans the directory once, parsing only headers and
//! tables, and builds an immutable index from [`FileId`] to its placement.
//! [`DataDir::read`] then returns the exact bytes of one data kind of one
//! file, decompressing only the chunks the range touches.
//!
//! # Example
//!
//! ```rust,no_run
//! use stingray_storage::{CancelFlag, DataDir, DataKind, FileId};
//!
//! # fn example() -> stingray_storage::Result<()> {
//! let dir = DataDir::open("/path/to/game/data", &CancelFlag::new(), |done, total| {
//!     println!("{done}/{total}");
//! })?;
//!
//! let id = FileId::from_names("content/ui/hud", "texture");
//! match dir.read(id, DataKind::Stream) {
//!     Ok(bytes) => println!("{} bytes", bytes.len()),
//!     Err(e) if e.is_not_found() => println!("no stream data"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

use thiserror::Error;

// Cooperative cancellation
pub mod cancel;

// Configuration
pub mod config;

// Index types and enumeration
pub mod index;

// Directory scan
mod indexer;

// Range reads
mod reader;

pub use cancel::CancelFlag;
pub use config::StorageConfig;
pub use index::{ContainerSource, DataDir, Edition, FileInfo, ManifestArchive, StandaloneBundle};
pub use stingray_formats::{DataKind, Locus};
pub use stingray_hash::{FileId, Hash};

use stingray_formats::{ArchiveError, BundleError, ManifestError};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Malformed container contents, by format
#[derive(Debug, Error)]
pub enum FormatError {
    /// Flat archive error
    #[error("archive: {0}")]
    Archive(#[from] ArchiveError),

    /// DSAR bundle error
    #[error("bundle: {0}")]
    Bundle(#[from] BundleError),

    /// DSAA manifest error
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Opening, seeking or reading a file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A container's header, tables or chunks are malformed
    #[error("invalid format in {}: {source}", .path.display())]
    Format {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        source: FormatError,
    },

    /// No container lists this file
    #[error("file not found: {0}")]
    FileNotExist(FileId),

    /// The file exists but has no data of this kind
    #[error("file {id} has no {kind} data")]
    DataKindNotExist {
        /// Requested file
        id: FileId,
        /// Requested data kind
        kind: DataKind,
    },

    /// The index references a container file that was absent at open
    #[error("container {id} has no {kind} file")]
    ContainerNotFound {
        /// Archive hash
        id: Hash,
        /// Data kind whose container is missing
        kind: DataKind,
    },

    /// The scan was canceled through its [`CancelFlag`]
    #[error("operation canceled")]
    Canceled,

    /// The root path is not a readable directory
    #[error("not a data directory: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &Path, source: impl Into<FormatError>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// Whether the requested file or data kind is simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotExist(_) | Self::DataKindNotExist { .. })
    }

    /// Whether this is a user-initiated cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
