//! Data kinds and their placement inside a container

use std::fmt;

/// One of the three co-located data streams of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    /// Main data, stored in the archive file itself
    Main,
    /// Streamed data, stored in `<archive>.stream`
    Stream,
    /// GPU resources, stored in `<archive>.gpu_resources`
    Gpu,
}

impl DataKind {
    /// All kinds in on-disk order
    pub const ALL: [Self; 3] = [Self::Main, Self::Stream, Self::Gpu];

    /// File name suffix of the container holding this kind
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Main => "",
            Self::Stream => ".stream",
            Self::Gpu => ".gpu_resources",
        }
    }

    /// Map a file extension (without the dot) back to a kind
    pub fn from_extension(ext: Option<&str>) -> Option<Self> {
        match ext {
            None | Some("") => Some(Self::Main),
            Some("stream") => Some(Self::Stream),
            Some("gpu_resources") => Some(Self::Gpu),
            Some(_) => None,
        }
    }

    /// Position in a `[Locus; 3]`
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Main => "main",
            Self::Stream => "stream",
            Self::Gpu => "gpu",
        })
    }
}

/// Byte span of one data kind inside its container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Locus {
    /// Offset in the (uncompressed) container
    pub offset: u64,
    /// Length in bytes
    pub size: u32,
}

impl Locus {
    /// Create a locus
    pub const fn new(offset: u64, size: u32) -> Self {
        Self { offset, size }
    }

    /// A zero-sized locus means the data kind is absent
    pub const fn exists(&self) -> bool {
        self.size > 0
    }
}
