//! File format parsers for Stingray asset packages
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::redundant_closure)] // binrw map attributes
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
//!
//! This crate decodes the on-disk containers used by the two editions of a
//! Stingray game's data directory. It only locates and decodes container
//! indices and chunks; payload contents are returned as raw bytes.
//!
//! # Supported Formats
//!
//! - **Flat archive** ([`archive`]): the fat edition's uncompressed archive
//!   header, type table and file table
//! - **DSAR** ([`bundle`]): chunked bundles, each chunk stored raw or as an
//!   LZ4 block
//! - **DSAA** ([`manifest`]): the slim edition's routing table from logical
//!   archive offsets to bundle chunks, stored in `bundles.nxa`
//!
//! # Design Principles
//!
//! - **Read-only**: parsers only; nothing here writes containers
//! - **Index, not payload**: loading reads headers and tables, never data
//! - **Validated up front**: magic, declared sizes and ordering are checked
//!   before any lookup relies on them

#![warn(missing_docs)]

pub mod archive;
pub mod bundle;
pub mod kind;
pub mod manifest;

pub use archive::{ArchiveError, FileRecord, FlatArchive};
pub use bundle::{BundleError, BundleLayout, Chunk, CompressionKind};
pub use kind::{DataKind, Locus};
pub use manifest::{ArchiveItem, Manifest, ManifestEntry, ManifestError};
