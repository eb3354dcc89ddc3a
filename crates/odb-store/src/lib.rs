//! Object store capability contract for odb.
//!
//! Every object store (loose, packed, alternate or compound) implements the
//! [`ObjectDb`] read contract. Stores that accept new objects additionally
//! implement [`ObjectDbWrite`] and advertise it through [`ObjectDb::writer`].
//!
//! # Storage Backends
//!
//! - [`LooseObjectDb`] -- one zstd-compressed file per object, git fan-out layout
//! - [`InMemoryObjectDb`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Absence is `Ok(None)` at the primitive level and [`StoreError::BadObject`]
//!    at the `info`/`stream` level.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod loose;
pub mod memory;
pub mod object;
pub mod sink;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use loose::LooseObjectDb;
pub use memory::InMemoryObjectDb;
pub use object::{IStream, ObjectInfo, ObjectStream};
pub use sink::{BufferSink, ObjectSink, SharedSink};
pub use traits::{ObjectDb, ObjectDbWrite, ShaIter};
