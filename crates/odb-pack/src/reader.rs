use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use odb_types::{HexPrefix, ObjectId, ObjectKind};

use crate::entry::{PackObjectKind, DELTA_TYPE_BYTE};
use crate::error::{PackError, PackResult};
use crate::index::{read_array, PackIndex};
use crate::writer::{decode_varint, PACK_HEADER_LEN, PACK_MAGIC, PACK_TRAILER_LEN, PACK_VERSION};

/// Backing bytes of an open pack.
enum PackData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for PackData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes.as_slice(),
            Self::Mapped(map) => &map[..],
        }
    }
}

/// Decoded entry header.
struct EntryHeader {
    kind: ObjectKind,
    uncompressed_size: u64,
    body_start: usize,
    body_end: usize,
}

/// Reads objects from a pack file using an index for random access.
pub struct PackReader {
    path: Option<PathBuf>,
    pack_data: PackData,
    index: PackIndex,
}

impl PackReader {
    /// Open from raw bytes.
    pub fn from_bytes(pack_data: Vec<u8>, index: PackIndex) -> PackResult<Self> {
        Self::validate(&pack_data, &index)?;
        Ok(Self {
            path: None,
            pack_data: PackData::Owned(pack_data),
            index,
        })
    }

    /// Open a `.pack` file and its sibling `.idx`.
    pub fn open(pack_path: &Path) -> PackResult<Self> {
        let index_path = pack_path.with_extension("idx");
        let index = PackIndex::from_bytes(&std::fs::read(&index_path)?)?;

        let file = File::open(pack_path)?;
        // SAFETY: pack files are never modified in place once written.
        let map = unsafe { Mmap::map(&file)? };
        Self::validate(&map, &index)?;

        Ok(Self {
            path: Some(pack_path.to_path_buf()),
            pack_data: PackData::Mapped(map),
            index,
        })
    }

    fn validate(data: &[u8], index: &PackIndex) -> PackResult<()> {
        if data.len() < PACK_HEADER_LEN + PACK_TRAILER_LEN {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "pack data too short".into(),
            });
        }
        if &data[0..4] != PACK_MAGIC {
            return Err(PackError::InvalidMagic {
                expected: String::from_utf8_lossy(PACK_MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_be_bytes(read_array(data, 4));
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let trailer = &data[data.len() - PACK_TRAILER_LEN..];
        if trailer != index.pack_checksum.as_slice() {
            return Err(PackError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Path of the `.pack` file, when opened from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read an object's kind and uncompressed size without decompressing it.
    pub fn read_header(&self, id: &ObjectId) -> PackResult<Option<(ObjectKind, u64)>> {
        let Some((offset, _)) = self.index.lookup(id) else {
            return Ok(None);
        };
        let header = self.entry_header(id, offset)?;
        Ok(Some((header.kind, header.uncompressed_size)))
    }

    /// Read an object by ID.
    pub fn read_object(&self, id: &ObjectId) -> PackResult<Option<(ObjectKind, Vec<u8>)>> {
        let Some((offset, expected_crc)) = self.index.lookup(id) else {
            return Ok(None);
        };
        let header = self.entry_header(id, offset)?;
        let pack: &[u8] = &self.pack_data;
        let compressed = &pack[header.body_start..header.body_end];

        if crc32fast::hash(compressed) != expected_crc {
            return Err(PackError::CrcMismatch { id: *id });
        }

        let decompressed = zstd::decode_all(compressed)
            .map_err(|e| PackError::DecompressionFailed(e.to_string()))?;

        if decompressed.len() as u64 != header.uncompressed_size {
            return Err(PackError::CorruptEntry {
                offset,
                reason: format!(
                    "size mismatch: expected {}, got {}",
                    header.uncompressed_size,
                    decompressed.len()
                ),
            });
        }
        Ok(Some((header.kind, decompressed)))
    }

    /// Check containment.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Object count.
    pub fn object_count(&self) -> usize {
        self.index.object_count()
    }

    /// Access the index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// List all object IDs, sorted.
    pub fn object_ids(&self) -> &[ObjectId] {
        &self.index.object_ids
    }

    /// Object IDs matching `prefix`, sorted.
    pub fn ids_with_prefix(&self, prefix: &HexPrefix) -> &[ObjectId] {
        self.index.ids_with_prefix(prefix)
    }

    fn entry_header(&self, id: &ObjectId, offset: u64) -> PackResult<EntryHeader> {
        let pack: &[u8] = &self.pack_data;
        let data = &pack[..data_end(pack)];
        let corrupt = |reason: &str| PackError::CorruptEntry {
            offset,
            reason: reason.to_string(),
        };

        let mut pos = usize::try_from(offset).map_err(|_| corrupt("offset overflow"))?;
        if pos < PACK_HEADER_LEN || pos >= data.len() {
            return Err(corrupt("offset outside pack data"));
        }

        let type_byte = data[pos];
        pos += 1;

        let (uncompressed_size, consumed) = decode_varint(&data[pos..])?;
        pos += consumed;
        let (compressed_size, consumed) = decode_varint(&data[pos..])?;
        pos += consumed;

        let kind = match PackObjectKind::from_type_byte(type_byte) {
            Some(PackObjectKind::Full(kind)) => kind,
            _ if type_byte == DELTA_TYPE_BYTE => {
                if pos + 32 > data.len() {
                    return Err(corrupt("delta base truncated"));
                }
                let base = ObjectId::from_hash(read_array(data, pos));
                return Err(PackError::DeltaUnsupported { id: *id, base });
            }
            _ => return Err(corrupt(&format!("unknown type byte: {type_byte}"))),
        };

        let body_end = usize::try_from(compressed_size)
            .ok()
            .and_then(|len| pos.checked_add(len))
            .filter(|end| *end <= data.len())
            .ok_or_else(|| corrupt("compressed data extends beyond pack"))?;

        Ok(EntryHeader {
            kind,
            uncompressed_size,
            body_start: pos,
            body_end,
        })
    }
}

/// Entries end where the checksum trailer begins.
fn data_end(data: &[u8]) -> usize {
    data.len() - PACK_TRAILER_LEN
}

impl std::fmt::Debug for PackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackReader")
            .field("path", &self.path)
            .field("object_count", &self.object_count())
            .finish()
    }
}
