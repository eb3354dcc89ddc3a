use std::io;
use std::sync::{Arc, Mutex};

use odb_types::ObjectId;

/// Destination for newly stored objects.
///
/// When a sink is installed on a writable store, `store` hands the encoded
/// object to the sink instead of writing it to the store's own location.
pub trait ObjectSink: Send + Sync {
    /// Accept one encoded object.
    fn accept(&self, id: &ObjectId, encoded: &[u8]) -> io::Result<()>;
}

/// Shared handle to an installed sink.
pub type SharedSink = Arc<dyn ObjectSink>;

/// Sink that keeps every accepted object in memory, in arrival order.
#[derive(Default)]
pub struct BufferSink {
    objects: Mutex<Vec<(ObjectId, Vec<u8>)>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects accepted so far.
    pub fn len(&self) -> usize {
        self.objects.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of the accepted objects, in arrival order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    /// Encoded bytes of the first accepted object with `id`.
    pub fn get(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("lock poisoned")
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, encoded)| encoded.clone())
    }

    /// Remove and return everything accepted so far.
    pub fn take(&self) -> Vec<(ObjectId, Vec<u8>)> {
        std::mem::take(&mut *self.objects.lock().expect("lock poisoned"))
    }
}

impl ObjectSink for BufferSink {
    fn accept(&self, id: &ObjectId, encoded: &[u8]) -> io::Result<()> {
        self.objects
            .lock()
            .expect("lock poisoned")
            .push((*id, encoded.to_vec()));
        Ok(())
    }
}

impl std::fmt::Debug for BufferSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSink")
            .field("object_count", &self.len())
            .finish()
    }
}
