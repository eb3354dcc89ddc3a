use std::path::{Path, PathBuf};

use odb_types::{ContentHasher, ObjectId, ObjectKind};

use crate::entry::{PackEntry, PackObjectKind};
use crate::error::{PackError, PackResult};
use crate::index::PackIndex;

pub(crate) const PACK_MAGIC: &[u8; 4] = b"ODBP";
pub(crate) const PACK_VERSION: u32 = 1;
pub(crate) const PACK_HEADER_LEN: usize = 12;
pub(crate) const PACK_TRAILER_LEN: usize = 32;

/// Result of writing a pack file.
#[derive(Clone, Debug)]
pub struct PackFile {
    pub pack_path: PathBuf,
    pub index_path: PathBuf,
    pub object_count: usize,
    pub checksum: [u8; 32],
}

/// Builds a pack file from a collection of objects.
pub struct PackWriter {
    path: PathBuf,
    entries: Vec<PackEntry>,
    compression_level: i32,
}

impl PackWriter {
    /// Create a new PackWriter targeting the given base path.
    ///
    /// `finish` writes `<path>.pack` and `<path>.idx`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            compression_level: 3,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Add a full object to the pack and return its ID.
    pub fn add_object(&mut self, kind: ObjectKind, data: &[u8]) -> ObjectId {
        let id = ContentHasher::for_kind(kind).hash(data);
        self.entries.push(PackEntry {
            id,
            kind: PackObjectKind::Full(kind),
            data: data.to_vec(),
        });
        id
    }

    /// Add an entry stored as a delta against `base`.
    ///
    /// Readers report such entries as unsupported; the format carries them so
    /// packs produced elsewhere can still be indexed and enumerated.
    pub fn add_delta(&mut self, id: ObjectId, base: ObjectId, delta: &[u8]) {
        self.entries.push(PackEntry {
            id,
            kind: PackObjectKind::Delta { base },
            data: delta.to_vec(),
        });
    }

    /// Queue a full object under an ID that was not derived from `data`.
    #[cfg(test)]
    pub(crate) fn add_object_as(&mut self, id: ObjectId, kind: ObjectKind, data: &[u8]) {
        self.entries.push(PackEntry {
            id,
            kind: PackObjectKind::Full(kind),
            data: data.to_vec(),
        });
    }

    /// Number of objects queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the pack and index to disk.
    pub fn finish(self) -> PackResult<PackFile> {
        let pack_path = self.path.with_extension("pack");
        let index_path = self.path.with_extension("idx");

        let (pack_data, index) = self.build_pack_bytes()?;

        // Index last: a pack without an index is ignored by readers.
        std::fs::write(&pack_path, &pack_data)?;
        std::fs::write(&index_path, index.to_bytes())?;

        tracing::debug!(
            pack = ?pack_path,
            objects = index.object_count(),
            "wrote pack file"
        );

        Ok(PackFile {
            pack_path,
            index_path,
            object_count: index.object_count(),
            checksum: index.pack_checksum,
        })
    }

    /// Build pack bytes and index in memory (no disk I/O).
    pub fn finish_to_bytes(self) -> PackResult<(Vec<u8>, PackIndex)> {
        self.build_pack_bytes()
    }

    fn build_pack_bytes(self) -> PackResult<(Vec<u8>, PackIndex)> {
        let mut pack_data = Vec::new();
        let mut index_entries = Vec::with_capacity(self.entries.len());

        // Header: magic + version + object count
        pack_data.extend_from_slice(PACK_MAGIC);
        pack_data.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack_data.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for entry in &self.entries {
            let offset = pack_data.len() as u64;

            pack_data.push(entry.kind.type_byte());

            let compressed = zstd::encode_all(entry.data.as_slice(), self.compression_level)
                .map_err(|e| PackError::CompressionFailed(e.to_string()))?;

            encode_varint(&mut pack_data, entry.data.len() as u64);
            encode_varint(&mut pack_data, compressed.len() as u64);

            if let PackObjectKind::Delta { base } = &entry.kind {
                pack_data.extend_from_slice(base.as_bytes());
            }

            let crc = crc32fast::hash(&compressed);
            pack_data.extend_from_slice(&compressed);

            index_entries.push((entry.id, crc, offset));
        }

        // Pack trailer: BLAKE3 checksum of everything so far
        let checksum = *blake3::hash(&pack_data).as_bytes();
        pack_data.extend_from_slice(&checksum);

        let index = PackIndex::build(index_entries, checksum);
        Ok((pack_data, index))
    }
}

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8]) -> PackResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(PackError::CorruptEntry {
        offset: 0,
        reason: "truncated varint".into(),
    })
}
