use odb_types::{HexPrefix, ObjectId};

use crate::error::{PackError, PackResult};

const INDEX_MAGIC: &[u8; 4] = b"ODBI";
const INDEX_VERSION: u32 = 1;

/// Pack index for fast random-access lookups.
///
/// Layout mirrors git's pack index v2:
/// - Fan-out table: 256 entries counting objects with first byte <= index
/// - Sorted ObjectId array
/// - CRC32 array (parallel)
/// - Offset array (parallel)
/// - Pack checksum
#[derive(Clone, Debug)]
pub struct PackIndex {
    pub fan_out: [u32; 256],
    pub object_ids: Vec<ObjectId>,
    pub crc32s: Vec<u32>,
    pub offsets: Vec<u64>,
    pub pack_checksum: [u8; 32],
}

/// Copy `N` bytes starting at `pos`. Callers check bounds first.
pub(crate) fn read_array<const N: usize>(data: &[u8], pos: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[pos..pos + N]);
    out
}

impl PackIndex {
    /// Build an index from (id, crc32, offset) entries and a pack checksum.
    pub fn build(mut entries: Vec<(ObjectId, u32, u64)>, pack_checksum: [u8; 32]) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);

        let mut fan_out = [0u32; 256];
        let mut object_ids = Vec::with_capacity(entries.len());
        let mut crc32s = Vec::with_capacity(entries.len());
        let mut offsets = Vec::with_capacity(entries.len());

        for (id, crc, offset) in &entries {
            fan_out[id.as_bytes()[0] as usize] += 1;
            object_ids.push(*id);
            crc32s.push(*crc);
            offsets.push(*offset);
        }

        // Turn per-byte counts into running totals.
        for slot in 1..256 {
            fan_out[slot] += fan_out[slot - 1];
        }

        Self {
            fan_out,
            object_ids,
            crc32s,
            offsets,
            pack_checksum,
        }
    }

    /// Index range of IDs whose first byte is `first_byte`.
    fn bucket(&self, first_byte: u8) -> std::ops::Range<usize> {
        let first_byte = first_byte as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.fan_out[first_byte - 1] as usize
        };
        start..self.fan_out[first_byte] as usize
    }

    /// Look up an object's (offset, crc32) by ID.
    pub fn lookup(&self, id: &ObjectId) -> Option<(u64, u32)> {
        let range = self.bucket(id.as_bytes()[0]);
        let start = range.start;
        let pos = self.object_ids[range].binary_search(id).ok()?;
        let idx = start + pos;
        Some((self.offsets[idx], self.crc32s[idx]))
    }

    /// All indexed IDs matching `prefix`, in sorted order.
    pub fn ids_with_prefix(&self, prefix: &HexPrefix) -> &[ObjectId] {
        let range = match prefix.first_byte() {
            Some(byte) => self.bucket(byte),
            None => 0..self.object_ids.len(),
        };
        let candidates = &self.object_ids[range];
        let lower = prefix.lower_bound();
        let start = candidates.partition_point(|id| *id < lower);
        let len = candidates[start..]
            .iter()
            .take_while(|id| prefix.matches(id))
            .count();
        &candidates[start..start + len]
    }

    /// Total object count.
    pub fn object_count(&self) -> usize {
        self.object_ids.len()
    }

    /// Check if an object exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.lookup(id).is_some()
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self.object_ids.len();
        let mut buf = Vec::with_capacity(8 + 256 * 4 + count * 44 + 32);
        buf.extend_from_slice(INDEX_MAGIC);
        buf.extend_from_slice(&INDEX_VERSION.to_be_bytes());
        for &count in &self.fan_out {
            buf.extend_from_slice(&count.to_be_bytes());
        }
        for id in &self.object_ids {
            buf.extend_from_slice(id.as_bytes());
        }
        for &crc in &self.crc32s {
            buf.extend_from_slice(&crc.to_be_bytes());
        }
        for &offset in &self.offsets {
            buf.extend_from_slice(&offset.to_be_bytes());
        }
        buf.extend_from_slice(&self.pack_checksum);
        buf
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> PackResult<Self> {
        if data.len() < 8 {
            return Err(PackError::IndexCorrupted("too short".into()));
        }
        if &data[0..4] != INDEX_MAGIC {
            return Err(PackError::InvalidMagic {
                expected: String::from_utf8_lossy(INDEX_MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_be_bytes(read_array(data, 4));
        if version != INDEX_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }

        let mut pos = 8;
        if data.len() < pos + 256 * 4 {
            return Err(PackError::IndexCorrupted("fan-out truncated".into()));
        }
        let mut fan_out = [0u32; 256];
        for entry in &mut fan_out {
            *entry = u32::from_be_bytes(read_array(data, pos));
            pos += 4;
        }
        if fan_out.windows(2).any(|w| w[0] > w[1]) {
            return Err(PackError::IndexCorrupted("fan-out not monotonic".into()));
        }

        let count = fan_out[255] as usize;
        let needed = pos + count * 32 + count * 4 + count * 8 + 32;
        if data.len() < needed {
            return Err(PackError::IndexCorrupted("data truncated".into()));
        }

        let mut object_ids = Vec::with_capacity(count);
        for _ in 0..count {
            object_ids.push(ObjectId::from_hash(read_array(data, pos)));
            pos += 32;
        }
        if object_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PackError::IndexCorrupted("object ids not sorted".into()));
        }

        let mut crc32s = Vec::with_capacity(count);
        for _ in 0..count {
            crc32s.push(u32::from_be_bytes(read_array(data, pos)));
            pos += 4;
        }

        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(u64::from_be_bytes(read_array(data, pos)));
            pos += 8;
        }

        let pack_checksum = read_array(data, pos);

        Ok(Self {
            fan_out,
            object_ids,
            crc32s,
            offsets,
            pack_checksum,
        })
    }
}
