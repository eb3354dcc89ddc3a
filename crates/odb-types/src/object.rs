use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of an object hash in bytes.
pub const HASH_LEN: usize = 32;

/// Length of an object hash in hex characters.
pub const HEX_LEN: usize = HASH_LEN * 2;

/// Content-addressed identifier for any stored object.
///
/// An `ObjectId` is the BLAKE3 hash of an object's content. Identical content
/// always produces the same `ObjectId`, which is what lets several stores hold
/// the same object and still agree on its name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; HASH_LEN]);

impl ObjectId {
    /// Compute an `ObjectId` from raw bytes, without domain separation.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create an `ObjectId` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; HASH_LEN]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Name of the fan-out directory holding this object in a loose store.
    pub fn fan_out_dir(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// File name of this object inside its fan-out directory.
    pub fn fan_out_file(&self) -> String {
        hex::encode(&self.0[1..])
    }

    /// Parse a full 64-character hex name.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let hash = <[u8; HASH_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
            TypeError::InvalidLength {
                expected: HASH_LEN,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(hash))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
