use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use odb_types::{ContentHasher, HexPrefix, ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{StoreError, StoreResult};
use crate::object::{prealloc_capacity, IStream, ObjectInfo, ObjectStream};
use crate::sink::SharedSink;
use crate::traits::{ObjectDb, ObjectDbWrite, ShaIter};

/// Default zstd level for newly written objects.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Header written in front of every loose object body.
///
/// On-disk format (the whole file is one zstd frame):
/// ```text
/// [bincode LooseHeader { kind, size }]
/// [size bytes: object body]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct LooseHeader {
    kind: ObjectKind,
    size: u64,
}

/// Object store holding one compressed file per object.
///
/// Objects live at `root/<first byte as hex>/<remaining bytes as hex>`, the
/// same fan-out layout git uses for `.git/objects`. This is the only store
/// kind that accepts writes.
pub struct LooseObjectDb {
    root: PathBuf,
    compression_level: i32,
    ostream: RwLock<Option<SharedSink>>,
}

impl LooseObjectDb {
    /// Open a loose store rooted at `root`. No I/O happens until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            ostream: RwLock::new(None),
        }
    }

    /// Use a different zstd level for newly written objects.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Path at which the object with `id` is (or would be) stored.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join(id.fan_out_dir()).join(id.fan_out_file())
    }

    /// Encode an object into its on-disk representation.
    pub fn encode(&self, kind: ObjectKind, data: &[u8]) -> StoreResult<Vec<u8>> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.compression_level)?;
        let header = LooseHeader {
            kind,
            size: data.len() as u64,
        };
        bincode::serialize_into(&mut encoder, &header)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    /// Open the object file and decode its header, leaving the decoder
    /// positioned at the start of the body.
    fn open_object(
        &self,
        id: &ObjectId,
    ) -> StoreResult<Option<(LooseHeader, zstd::Decoder<'static, io::BufReader<File>>)>> {
        let file = match File::open(self.object_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut decoder = zstd::Decoder::new(file)?;
        let header: LooseHeader =
            bincode::deserialize_from(&mut decoder).map_err(|e| StoreError::CorruptObject {
                id: *id,
                reason: format!("unreadable header: {e}"),
            })?;
        Ok(Some((header, decoder)))
    }

    fn write_object_file(&self, id: &ObjectId, encoded: &[u8]) -> StoreResult<()> {
        let path = self.object_path(id);
        if path.exists() {
            return Ok(());
        }
        let dir = self.root.join(id.fan_out_dir());
        fs::create_dir_all(&dir)?;

        // Write-then-rename so readers never observe a partial object.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

/// Fan-out directories are named by exactly two lowercase hex digits.
fn is_fan_out_name(name: &str) -> bool {
    name.len() == 2 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parse an object file inside fan-out directory `dir`.
fn parse_object_name(dir: &str, file: &str) -> Option<ObjectId> {
    if file.len() != odb_types::object::HEX_LEN - 2 {
        return None;
    }
    ObjectId::from_hex(&format!("{dir}{file}")).ok()
}

fn entry_to_id(entry: &DirEntry) -> Option<ObjectId> {
    if !entry.file_type().is_file() {
        return None;
    }
    let file = entry.file_name().to_str()?;
    let dir = entry.path().parent()?.file_name()?.to_str()?;
    parse_object_name(dir, file)
}

impl ObjectDb for LooseObjectDb {
    fn read_info(&self, id: &ObjectId) -> StoreResult<Option<ObjectInfo>> {
        Ok(self
            .open_object(id)?
            .map(|(header, _)| ObjectInfo::new(*id, header.kind, header.size)))
    }

    fn read_stream(&self, id: &ObjectId) -> StoreResult<Option<ObjectStream>> {
        let Some((header, decoder)) = self.open_object(id)? else {
            return Ok(None);
        };
        let mut data = Vec::with_capacity(prealloc_capacity(header.size));
        decoder
            .take(header.size.saturating_add(1))
            .read_to_end(&mut data)?;
        if data.len() as u64 != header.size {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!(
                    "size mismatch: header says {}, body has {}",
                    header.size,
                    data.len()
                ),
            });
        }
        let computed = ContentHasher::for_kind(header.kind).hash(&data);
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        let info = ObjectInfo::new(*id, header.kind, header.size);
        Ok(Some(ObjectStream::new(info, data)))
    }

    fn size(&self) -> StoreResult<usize> {
        self.sha_iter().try_fold(0, |count, id| id.map(|_| count + 1))
    }

    fn sha_iter(&self) -> ShaIter<'_> {
        if !self.root.is_dir() {
            return Box::new(std::iter::empty());
        }
        let walker = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() != 1
                    || (entry.file_type().is_dir()
                        && entry.file_name().to_str().is_some_and(is_fan_out_name))
            });
        Box::new(walker.filter_map(|entry| match entry {
            Ok(entry) => entry_to_id(&entry).map(Ok),
            Err(e) => Some(Err(StoreError::Io(e.into()))),
        }))
    }

    fn writer(&self) -> Option<&dyn ObjectDbWrite> {
        Some(self)
    }

    fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn ids_with_prefix(&self, prefix: &HexPrefix) -> StoreResult<Vec<ObjectId>> {
        let Some(first) = prefix.first_byte() else {
            let mut matches = Vec::new();
            for id in self.sha_iter() {
                let id = id?;
                if prefix.matches(&id) {
                    matches.push(id);
                }
            }
            return Ok(matches);
        };

        // Only one fan-out directory can hold matches.
        let dir_name = format!("{first:02x}");
        let dir = self.root.join(&dir_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(file) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(id) = parse_object_name(&dir_name, &file) {
                if prefix.matches(&id) {
                    matches.push(id);
                }
            }
        }
        matches.sort();
        Ok(matches)
    }
}

impl ObjectDbWrite for LooseObjectDb {
    fn store(&self, istream: IStream) -> StoreResult<ObjectInfo> {
        let kind = istream.kind();
        let data = istream.read_body()?;
        let id = ContentHasher::for_kind(kind).hash(&data);
        let encoded = self.encode(kind, &data)?;

        let sink = self.ostream.read().expect("lock poisoned").clone();
        match sink {
            Some(sink) => {
                debug!(id = %id.short_hex(), %kind, "sending loose object to installed sink");
                sink.accept(&id, &encoded)?;
            }
            None => {
                debug!(id = %id.short_hex(), %kind, root = ?self.root, "writing loose object");
                self.write_object_file(&id, &encoded)?;
            }
        }
        Ok(ObjectInfo::new(id, kind, data.len() as u64))
    }

    fn ostream(&self) -> StoreResult<Option<SharedSink>> {
        Ok(self.ostream.read().expect("lock poisoned").clone())
    }

    fn set_ostream(&self, sink: Option<SharedSink>) -> StoreResult<Option<SharedSink>> {
        let mut slot = self.ostream.write().expect("lock poisoned");
        Ok(std::mem::replace(&mut *slot, sink))
    }
}

impl std::fmt::Debug for LooseObjectDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LooseObjectDb")
            .field("root", &self.root)
            .field("compression_level", &self.compression_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;
    use std::sync::Arc;

    fn store_blob(db: &LooseObjectDb, data: &[u8]) -> ObjectInfo {
        db.store(IStream::from_bytes(ObjectKind::Blob, data.to_vec()))
            .unwrap()
    }

    #[test]
    fn store_writes_fan_out_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let info = store_blob(&db, b"hello loose");

        let path = db.object_path(&info.id);
        assert!(path.is_file());
        assert_eq!(
            path.parent().unwrap().file_name().unwrap().to_str().unwrap(),
            info.id.fan_out_dir()
        );
    }

    #[test]
    fn store_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let info = store_blob(&db, b"roundtrip body");

        let read = db.info(&info.id).unwrap();
        assert_eq!(read, info);
        let stream = db.stream(&info.id).unwrap();
        assert_eq!(stream.kind(), ObjectKind::Blob);
        assert_eq!(stream.into_bytes(), b"roundtrip body");
    }

    #[test]
    fn kinds_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let info = db
            .store(IStream::from_bytes(ObjectKind::Commit, b"tree abc".to_vec()))
            .unwrap();
        assert_eq!(db.info(&info.id).unwrap().kind, ObjectKind::Commit);
    }

    #[test]
    fn store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let a = store_blob(&db, b"twice");
        let b = store_blob(&db, b"twice");
        assert_eq!(a, b);
        assert_eq!(db.size().unwrap(), 1);
    }

    #[test]
    fn missing_object_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let id = ObjectId::from_bytes(b"missing");
        assert!(db.read_info(&id).unwrap().is_none());
        assert!(db.read_stream(&id).unwrap().is_none());
        assert!(db.stream(&id).unwrap_err().is_bad_object());
        assert!(!db.has_object(&id).unwrap());
    }

    #[test]
    fn sha_iter_ignores_non_object_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pack")).unwrap();
        fs::create_dir_all(dir.path().join("info")).unwrap();
        fs::write(dir.path().join("info").join("alternates"), "").unwrap();
        fs::create_dir_all(dir.path().join("ab")).unwrap();
        fs::write(dir.path().join("ab").join("not-an-object"), "x").unwrap();

        let db = LooseObjectDb::new(dir.path());
        let ids: Vec<ObjectId> = (0..4)
            .map(|i| store_blob(&db, format!("obj-{i}").as_bytes()).id)
            .collect();

        let mut listed: Vec<ObjectId> = db.sha_iter().map(|r| r.unwrap()).collect();
        listed.sort();
        let mut expected = ids;
        expected.sort();
        assert_eq!(listed, expected);
        assert_eq!(db.size().unwrap(), 4);
    }

    #[test]
    fn sha_iter_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        store_blob(&db, b"one");
        store_blob(&db, b"two");
        let first: Vec<_> = db.sha_iter().map(|r| r.unwrap()).collect();
        let second: Vec<_> = db.sha_iter().map(|r| r.unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path().join("nope"));
        assert_eq!(db.size().unwrap(), 0);
    }

    #[test]
    fn corrupted_body_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let info = store_blob(&db, b"original");

        // Overwrite the file with a valid encoding of different content.
        let forged = db.encode(ObjectKind::Blob, b"tampered").unwrap();
        fs::write(db.object_path(&info.id), forged).unwrap();

        let err = db.stream(&info.id).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
    }

    #[test]
    fn oversized_header_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let id = ObjectId::from_bytes(b"forged header");

        let mut encoder = zstd::Encoder::new(Vec::new(), DEFAULT_COMPRESSION_LEVEL).unwrap();
        let header = LooseHeader {
            kind: ObjectKind::Blob,
            size: u64::MAX,
        };
        bincode::serialize_into(&mut encoder, &header).unwrap();
        encoder.write_all(b"x").unwrap();
        let path = db.object_path(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let err = db.read_stream(&id).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let id = ObjectId::from_bytes(b"garbage");
        let path = db.object_path(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"definitely not zstd").unwrap();
        assert!(db.read_info(&id).is_err());
    }

    #[test]
    fn ids_with_prefix_scans_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let ids: Vec<ObjectId> = (0..16)
            .map(|i| store_blob(&db, format!("p-{i}").as_bytes()).id)
            .collect();

        for id in &ids {
            let prefix = HexPrefix::parse(&id.to_hex()[..10]).unwrap();
            assert_eq!(db.ids_with_prefix(&prefix).unwrap(), vec![*id]);
        }

        let nibble = HexPrefix::parse(&ids[0].to_hex()[..1]).unwrap();
        let by_nibble = db.ids_with_prefix(&nibble).unwrap();
        assert!(by_nibble.contains(&ids[0]));
        assert!(by_nibble.iter().all(|id| nibble.matches(id)));
    }

    #[test]
    fn installed_sink_diverts_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let sink = Arc::new(BufferSink::new());
        db.set_ostream(Some(sink.clone())).unwrap();

        let info = store_blob(&db, b"to the sink");
        assert!(!db.object_path(&info.id).exists());
        let encoded = sink.get(&info.id).unwrap();
        assert_eq!(encoded, db.encode(ObjectKind::Blob, b"to the sink").unwrap());

        let previous = db.set_ostream(None).unwrap();
        assert!(previous.is_some());
        assert!(db.ostream().unwrap().is_none());
    }

    #[test]
    fn size_mismatch_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let db = LooseObjectDb::new(dir.path());
        let istream = IStream::new(ObjectKind::Blob, 100, io::Cursor::new(b"short".to_vec()));
        assert!(matches!(
            db.store(istream).unwrap_err(),
            StoreError::SizeMismatch { .. }
        ));
        assert_eq!(db.size().unwrap(), 0);
    }
}
