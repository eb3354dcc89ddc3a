use std::fmt;
use std::io::{Cursor, Read};

use odb_types::{ObjectId, ObjectKind};
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Header information about a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectInfo {
    /// Content-addressed ID of the object.
    pub id: ObjectId,
    /// The type of this object.
    pub kind: ObjectKind,
    /// Size of the uncompressed body in bytes.
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(id: ObjectId, kind: ObjectKind, size: u64) -> Self {
        Self { id, kind, size }
    }
}

/// A readable object: its header plus its uncompressed body.
pub struct ObjectStream {
    info: ObjectInfo,
    body: Cursor<Vec<u8>>,
}

impl ObjectStream {
    /// Wrap an already decoded body.
    pub fn new(info: ObjectInfo, data: Vec<u8>) -> Self {
        Self {
            info,
            body: Cursor::new(data),
        }
    }

    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    pub fn id(&self) -> ObjectId {
        self.info.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.info.kind
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Consume the stream and return the whole body, regardless of how much
    /// has already been read.
    pub fn into_bytes(self) -> Vec<u8> {
        self.body.into_inner()
    }
}

impl Read for ObjectStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.body.read(buf)
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("info", &self.info)
            .field("position", &self.body.position())
            .finish()
    }
}

/// Upper bound on buffer space reserved up front from an untrusted size.
const MAX_PREALLOC: u64 = 64 * 1024;

/// Initial capacity for a body whose size was declared, not yet observed.
pub(crate) fn prealloc_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Input for [`ObjectDbWrite::store`](crate::ObjectDbWrite::store): the kind
/// and declared size of a new object, plus a reader for its body.
pub struct IStream {
    kind: ObjectKind,
    size: u64,
    reader: Box<dyn Read + Send>,
}

impl IStream {
    pub fn new(kind: ObjectKind, size: u64, reader: impl Read + Send + 'static) -> Self {
        Self {
            kind,
            size,
            reader: Box::new(reader),
        }
    }

    /// Input stream over an in-memory body; the size is taken from the data.
    pub fn from_bytes(kind: ObjectKind, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(kind, size, Cursor::new(data))
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the whole body, checking it against the declared size.
    pub fn read_body(self) -> StoreResult<Vec<u8>> {
        let declared = self.size;
        let mut data = Vec::with_capacity(prealloc_capacity(declared));
        // One byte past the declared size is enough to detect an overlong stream.
        self.reader
            .take(declared.saturating_add(1))
            .read_to_end(&mut data)?;
        let actual = data.len() as u64;
        if actual != declared {
            return Err(StoreError::SizeMismatch { declared, actual });
        }
        Ok(data)
    }
}

impl fmt::Debug for IStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IStream")
            .field("kind", &self.kind)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
