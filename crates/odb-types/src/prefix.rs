use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;
use crate::object::{ObjectId, HASH_LEN, HEX_LEN};

/// An abbreviated object name: the leading hex digits of an [`ObjectId`].
///
/// Prefixes may have an odd number of digits, in which case the last digit
/// constrains only the high nibble of its byte. Input is case-insensitive and
/// normalized to lowercase.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HexPrefix {
    text: String,
    bytes: Vec<u8>,
}

impl HexPrefix {
    /// Parse an abbreviated object name.
    ///
    /// The prefix must be between 1 and 64 hex digits long.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPrefix {
            prefix: s.to_string(),
            reason: reason.to_string(),
        };
        if s.is_empty() {
            return Err(invalid("empty"));
        }
        if s.len() > HEX_LEN {
            return Err(invalid("longer than a full object name"));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("not a hex string"));
        }

        let text = s.to_ascii_lowercase();
        let mut padded = text.clone();
        if padded.len() % 2 == 1 {
            padded.push('0');
        }
        let bytes = hex::decode(&padded).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self { text, bytes })
    }

    /// Number of hex digits in the prefix.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Always `false`; an empty prefix cannot be parsed.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The normalized (lowercase) prefix text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The fully specified first byte, if the prefix has at least two digits.
    pub fn first_byte(&self) -> Option<u8> {
        (self.len() >= 2).then(|| self.bytes[0])
    }

    /// The smallest object ID that matches this prefix.
    pub fn lower_bound(&self) -> ObjectId {
        let mut bound = [0u8; HASH_LEN];
        bound[..self.bytes.len()].copy_from_slice(&self.bytes);
        ObjectId::from_hash(bound)
    }

    /// Returns `true` if `id`'s hex encoding starts with this prefix.
    pub fn matches(&self, id: &ObjectId) -> bool {
        let full = self.len() / 2;
        let id_bytes = id.as_bytes();
        if id_bytes[..full] != self.bytes[..full] {
            return false;
        }
        if self.len() % 2 == 1 {
            return id_bytes[full] >> 4 == self.bytes[full] >> 4;
        }
        true
    }
}

impl fmt::Debug for HexPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexPrefix({})", self.text)
    }
}

impl fmt::Display for HexPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for HexPrefix {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&ObjectId> for HexPrefix {
    fn from(id: &ObjectId) -> Self {
        Self {
            text: id.to_hex(),
            bytes: id.as_bytes().to_vec(),
        }
    }
}
