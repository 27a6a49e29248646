//! Content identity types built on Murmur64A

use crate::error::HashError;
use crate::murmur::murmur64a;
use binrw::{BinRead, BinWrite};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 64-bit content hash identifying a resource name, type or archive
#[derive(
    BinRead,
    BinWrite,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[brw(little)]
pub struct Hash(pub u64);

impl Hash {
    /// Number of hex digits in the textual form
    pub const HEX_LEN: usize = 16;

    /// Create from a raw value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Hash a byte string
    pub fn of(data: &[u8]) -> Self {
        Self(murmur64a(data))
    }

    /// Hash a name or path
    pub fn of_str(name: &str) -> Self {
        Self::of(name.as_bytes())
    }

    /// Raw 64-bit value
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Upper 32 bits, used for secondary identifiers
    pub const fn thin(self) -> ThinHash {
        ThinHash((self.0 >> 32) as u32)
    }

    /// Parse 16 hex digits, with or without a `0x` prefix
    ///
    /// Container files are named this way, so this is how an archive's
    /// identity is recovered from its path.
    pub fn from_hex(text: &str) -> Result<Self, HashError> {
        let digits = strip_prefix(text);
        if digits.len() != Self::HEX_LEN {
            return Err(HashError::InvalidLength {
                expected: Self::HEX_LEN,
                actual: digits.len(),
            });
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }

    /// On-disk file name: 16 lowercase hex digits, no prefix
    pub fn to_file_name(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u64> for Hash {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Hash> for u64 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

/// 32-bit truncation of a [`Hash`]
///
/// Always the upper half of some 64-bit hash. Bone and material names are
/// stored this way.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
pub struct ThinHash(pub u32);

impl ThinHash {
    /// Hash a name and keep the upper 32 bits
    pub fn of_str(name: &str) -> Self {
        Hash::of_str(name).thin()
    }

    /// Raw 32-bit value
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<Hash> for ThinHash {
    fn from(hash: Hash) -> Self {
        hash.thin()
    }
}

/// Logical asset identity: resource name plus resource type
#[derive(
    BinRead,
    BinWrite,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[brw(little)]
pub struct FileId {
    /// Hash of the resource path
    pub name: Hash,
    /// Hash of the type name (e.g. "texture")
    pub kind: Hash,
}

impl FileId {
    /// Create from already-hashed components
    pub const fn new(name: Hash, kind: Hash) -> Self {
        Self { name, kind }
    }

    /// Create by hashing a resource path and type name
    pub fn from_names(name: &str, kind: &str) -> Self {
        Self {
            name: Hash::of_str(name),
            kind: Hash::of_str(kind),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.kind)
    }
}

fn strip_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use binrw::BinReaderExt;
    use std::io::Cursor;

    #[test]
    fn test_hash_display() {
        let hash = Hash::new(0x9ba6_26af_a44a_3aa3);
        assert_eq!(hash.to_string(), "0x9ba626afa44a3aa3");
        assert_eq!(hash.to_file_name(), "9ba626afa44a3aa3");
        assert_eq!(Hash::new(1).to_string(), "0x0000000000000001");
    }

    #[test]
    fn test_thin_hash_is_upper_half() {
        let hash = Hash::of_str("texture");
        assert_eq!(hash.thin(), ThinHash(0xcd42_38c6));
        assert_eq!(hash.thin().to_string(), "0xcd4238c6");
        assert_eq!(ThinHash::of_str("texture"), hash.thin());
    }

    #[test]
    fn test_from_hex() {
        let expected = Hash::new(0x9ba6_26af_a44a_3aa3);
        assert_eq!(Hash::from_hex("9ba626afa44a3aa3").unwrap(), expected);
        assert_eq!(Hash::from_hex("0x9BA626AFA44A3AA3").unwrap(), expected);
        assert_eq!("9ba626afa44a3aa3".parse::<Hash>().unwrap(), expected);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            Hash::from_hex("9ba626af"),
            Err(HashError::InvalidLength {
                expected: 16,
                actual: 8
            })
        ));
        assert!(matches!(
            Hash::from_hex("9ba626afa44a3aag"),
            Err(HashError::InvalidHex(_))
        ));
        assert!(Hash::from_hex("bundles.nxa").is_err());
    }

    #[test]
    fn test_file_id_reads_little_endian() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x0102_0304_0506_0708_u64.to_le_bytes());
        data.extend_from_slice(&0xcd42_38c6_a0c6_9e32_u64.to_le_bytes());

        let id: FileId = Cursor::new(&data).read_le().unwrap();
        assert_eq!(id.name, Hash::new(0x0102_0304_0506_0708));
        assert_eq!(id.kind, Hash::of_str("texture"));

        let mut written = Cursor::new(Vec::new());
        id.write_le(&mut written).unwrap();
        assert_eq!(written.into_inner(), data);
    }

    #[test]
    fn test_file_id_from_names() {
        let id = FileId::from_names("content/fx/smoke", "texture");
        assert_eq!(id.name, Hash::new(0x65a8_5132_bdfd_19b7));
        assert_eq!(id.to_string(), "0x65a85132bdfd19b7.0xcd4238c6a0c69e32");
    }

    #[test]
    fn test_hash_serde_round_trip() {
        let id = FileId::from_names("a", "unit");
        let json = serde_json::to_string(&id).unwrap();
        let back: FileId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn hash_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
                prop_assert_eq!(Hash::of(&data), Hash::of(&data));
            }

            #[test]
            fn thin_is_upper_32_bits(data in prop::collection::vec(any::<u8>(), 0..256)) {
                let hash = Hash::of(&data);
                prop_assert_eq!(hash.thin().value(), (hash.value() >> 32) as u32);
            }

            #[test]
            fn file_name_parses_back(value in any::<u64>()) {
                let hash = Hash::new(value);
                prop_assert_eq!(Hash::from_hex(&hash.to_file_name()).unwrap(), hash);
                prop_assert_eq!(Hash::from_hex(&hash.to_string()).unwrap(), hash);
            }
        }
    }
}
