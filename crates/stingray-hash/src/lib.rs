//! Content hashing for Stingray asset packages
//!
//! Every resource, resource type and archive in a Stingray data directory is
//! identified by a 64-bit Murmur64A hash of its name. This crate provides the
//! hash function and the identity types built on it.
//!
//! # Components
//!
//! - **Hashing**: [`murmur64a`] with seed 0
//! - **Identity**: [`Hash`] (64-bit), [`ThinHash`] (upper 32 bits) and
//!   [`FileId`] (name + type pair)
//!
//! # Examples
//!
//! ```
//! use stingray_hash::{FileId, Hash};
//!
//! let id = FileId::from_names("content/fx/smoke", "texture");
//! assert_eq!(id.kind, Hash::new(0xcd42_38c6_a0c6_9e32));
//! println!("{id}");
//!
//! // Archives are named by the hex form of their hash
//! let archive = Hash::from_hex("9ba626afa44a3aa3").unwrap();
//! assert_eq!(archive.to_file_name(), "9ba626afa44a3aa3");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod murmur;

pub use error::HashError;
pub use id::{FileId, Hash, ThinHash};
pub use murmur::murmur64a;
