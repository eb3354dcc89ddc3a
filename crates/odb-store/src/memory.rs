use std::collections::BTreeMap;
use std::sync::RwLock;

use odb_types::{ContentHasher, ObjectId, ObjectKind};

use crate::error::{StoreError, StoreResult};
use crate::object::{IStream, ObjectInfo, ObjectStream};
use crate::sink::SharedSink;
use crate::traits::{ObjectDb, ObjectDbWrite, ShaIter};

/// In-memory, map-based object store.
///
/// Intended for tests and embedding. A store created with
/// [`InMemoryObjectDb::read_only`] does not advertise the write capability,
/// which makes it a convenient stand-in for a misconfigured primary store.
pub struct InMemoryObjectDb {
    objects: RwLock<BTreeMap<ObjectId, (ObjectKind, Vec<u8>)>>,
    ostream: RwLock<Option<SharedSink>>,
    writable: bool,
}

impl InMemoryObjectDb {
    /// Create a new empty, writable store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            ostream: RwLock::new(None),
            writable: true,
        }
    }

    /// Create a store that exposes no write capability.
    pub fn read_only() -> Self {
        Self {
            writable: false,
            ..Self::new()
        }
    }

    /// Seed an object directly, bypassing the write capability and any sink.
    pub fn insert(&self, kind: ObjectKind, data: impl Into<Vec<u8>>) -> ObjectId {
        let data = data.into();
        let id = ContentHasher::for_kind(kind).hash(&data);
        self.objects
            .write()
            .expect("lock poisoned")
            .entry(id)
            .or_insert((kind, data));
        id
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryObjectDb {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectDb for InMemoryObjectDb {
    fn read_info(&self, id: &ObjectId) -> StoreResult<Option<ObjectInfo>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(id)
            .map(|(kind, data)| ObjectInfo::new(*id, *kind, data.len() as u64)))
    }

    fn read_stream(&self, id: &ObjectId) -> StoreResult<Option<ObjectStream>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).map(|(kind, data)| {
            let info = ObjectInfo::new(*id, *kind, data.len() as u64);
            ObjectStream::new(info, data.clone())
        }))
    }

    fn size(&self) -> StoreResult<usize> {
        Ok(self.len())
    }

    fn sha_iter(&self) -> ShaIter<'_> {
        // Snapshot the keys so the iterator does not hold the lock.
        let ids: Vec<ObjectId> = self
            .objects
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect();
        Box::new(ids.into_iter().map(Ok))
    }

    fn writer(&self) -> Option<&dyn ObjectDbWrite> {
        if self.writable {
            Some(self)
        } else {
            None
        }
    }

    fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(id))
    }
}

impl ObjectDbWrite for InMemoryObjectDb {
    fn store(&self, istream: IStream) -> StoreResult<ObjectInfo> {
        if !self.writable {
            return Err(StoreError::Unsupported(
                "store on a read-only in-memory database".into(),
            ));
        }
        let kind = istream.kind();
        let data = istream.read_body()?;
        let id = ContentHasher::for_kind(kind).hash(&data);
        let info = ObjectInfo::new(id, kind, data.len() as u64);

        let sink = self.ostream.read().expect("lock poisoned").clone();
        match sink {
            Some(sink) => sink.accept(&id, &data)?,
            None => {
                self.objects
                    .write()
                    .expect("lock poisoned")
                    .entry(id)
                    .or_insert((kind, data));
            }
        }
        Ok(info)
    }

    fn ostream(&self) -> StoreResult<Option<SharedSink>> {
        Ok(self.ostream.read().expect("lock poisoned").clone())
    }

    fn set_ostream(&self, sink: Option<SharedSink>) -> StoreResult<Option<SharedSink>> {
        let mut slot = self.ostream.write().expect("lock poisoned");
        Ok(std::mem::replace(&mut *slot, sink))
    }
}

impl std::fmt::Debug for InMemoryObjectDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectDb")
            .field("object_count", &self.len())
            .field("writable", &self.writable)
            .finish()
    }
}
