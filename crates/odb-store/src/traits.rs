use odb_types::{HexPrefix, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::object::{IStream, ObjectInfo, ObjectStream};
use crate::sink::SharedSink;

/// Lazy iterator over the object IDs held by a store.
///
/// Each call to [`ObjectDb::sha_iter`] starts a fresh walk.
pub type ShaIter<'a> = Box<dyn Iterator<Item = StoreResult<ObjectId>> + 'a>;

/// Read side of a content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same ID always names the same
///   content.
/// - A missing object is `Ok(None)` from the `read_*` primitives, never an
///   error. Errors mean the store itself failed.
/// - `sha_iter` is finite and yields exactly `size()` items when the store
///   is not modified concurrently.
pub trait ObjectDb: Send + Sync {
    /// Read an object's header by ID.
    fn read_info(&self, id: &ObjectId) -> StoreResult<Option<ObjectInfo>>;

    /// Read an object's header and body by ID.
    fn read_stream(&self, id: &ObjectId) -> StoreResult<Option<ObjectStream>>;

    /// Number of objects held.
    fn size(&self) -> StoreResult<usize>;

    /// Enumerate every object ID held.
    fn sha_iter(&self) -> ShaIter<'_>;

    /// The write capability of this store, if it has one.
    fn writer(&self) -> Option<&dyn ObjectDbWrite> {
        None
    }

    /// Check whether an object exists in the store.
    fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.read_info(id)?.is_some())
    }

    /// Object header, failing with [`StoreError::BadObject`] when absent.
    fn info(&self, id: &ObjectId) -> StoreResult<ObjectInfo> {
        self.read_info(id)?
            .ok_or_else(|| StoreError::BadObject(id.to_hex()))
    }

    /// Object header and body, failing with [`StoreError::BadObject`] when
    /// absent.
    fn stream(&self, id: &ObjectId) -> StoreResult<ObjectStream> {
        self.read_stream(id)?
            .ok_or_else(|| StoreError::BadObject(id.to_hex()))
    }

    /// All held IDs whose hex encoding starts with `prefix`.
    ///
    /// The default implementation scans `sha_iter`. Backends with an ordered
    /// index override it.
    fn ids_with_prefix(&self, prefix: &HexPrefix) -> StoreResult<Vec<ObjectId>> {
        let mut matches = Vec::new();
        for id in self.sha_iter() {
            let id = id?;
            if prefix.matches(&id) {
                matches.push(id);
            }
        }
        Ok(matches)
    }
}

/// Write side of an object store.
pub trait ObjectDbWrite: ObjectDb {
    /// Store the object read from `istream` and return its header.
    ///
    /// Storing an object that already exists is a no-op that returns the
    /// same header.
    fn store(&self, istream: IStream) -> StoreResult<ObjectInfo>;

    /// The sink currently receiving newly stored objects, if one is installed.
    fn ostream(&self) -> StoreResult<Option<SharedSink>>;

    /// Install (or with `None`, remove) the sink for newly stored objects.
    ///
    /// Returns the previously installed sink.
    fn set_ostream(&self, sink: Option<SharedSink>) -> StoreResult<Option<SharedSink>>;
}
