use odb_types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

/// Type byte of a ref-delta entry; the base object ID follows the size varints.
pub const DELTA_TYPE_BYTE: u8 = 7;

/// Type tag for pack entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackObjectKind {
    /// Complete object with its full data.
    Full(ObjectKind),
    /// Delta-compressed against a base object.
    Delta { base: ObjectId },
}

impl PackObjectKind {
    /// Serialize to a type byte for the pack format.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Full(ObjectKind::Blob) => 1,
            Self::Full(ObjectKind::Tree) => 2,
            Self::Full(ObjectKind::Commit) => 3,
            Self::Full(ObjectKind::Tag) => 4,
            Self::Delta { .. } => DELTA_TYPE_BYTE,
        }
    }

    /// Parse from a type byte (full objects only; deltas need the base ID).
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Full(ObjectKind::Blob)),
            2 => Some(Self::Full(ObjectKind::Tree)),
            3 => Some(Self::Full(ObjectKind::Commit)),
            4 => Some(Self::Full(ObjectKind::Tag)),
            _ => None,
        }
    }
}

/// A single entry queued for a pack file.
#[derive(Clone, Debug)]
pub struct PackEntry {
    /// Content-addressed ID of the object.
    pub id: ObjectId,
    /// Type of this pack entry.
    pub kind: PackObjectKind,
    /// Uncompressed data.
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_byte_roundtrip_full_kinds() {
        for kind in ObjectKind::ALL {
            let full = PackObjectKind::Full(kind);
            assert_eq!(PackObjectKind::from_type_byte(full.type_byte()), Some(full));
        }
    }

    #[test]
    fn type_byte_delta() {
        let kind = PackObjectKind::Delta {
            base: ObjectId::from_hash([0; odb_types::object::HASH_LEN]),
        };
        assert_eq!(kind.type_byte(), DELTA_TYPE_BYTE);
        assert!(PackObjectKind::from_type_byte(DELTA_TYPE_BYTE).is_none());
    }

    #[test]
    fn from_type_byte_unknown() {
        assert!(PackObjectKind::from_type_byte(0).is_none());
        assert!(PackObjectKind::from_type_byte(5).is_none());
        assert!(PackObjectKind::from_type_byte(255).is_none());
    }
}
