use std::path::PathBuf;

use odb_types::{ObjectId, TypeError};

/// Errors from object store operations.
///
/// This is the error type of the [`ObjectDb`](crate::ObjectDb) contract, so
/// an error raised by one sub-store reaches callers of a compound store as
/// the same variant.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No store could resolve the given object name.
    #[error("bad object: {0}")]
    BadObject(String),

    /// An abbreviated object name matched more than one object.
    #[error("ambiguous object name {prefix}: {candidates} objects match")]
    AmbiguousObject { prefix: String, candidates: usize },

    /// The object name or kind could not be parsed.
    #[error("invalid object name: {0}")]
    InvalidName(#[from] TypeError),

    /// None of the recognized sub-store paths exist under the root.
    #[error("no object database found under {}", .0.display())]
    RootNotFound(PathBuf),

    /// The store configuration did not yield a usable primary writable store.
    #[error("misconfigured writable store under {}: {reason}", root.display())]
    MisconfiguredWritableStore { root: PathBuf, reason: String },

    /// A path handed to the directory resolver is not a repository directory.
    #[error("not a git directory: {}", .0.display())]
    InvalidGitDirectory(PathBuf),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// An input stream yielded a different number of bytes than declared.
    #[error("size mismatch: declared {declared} bytes, read {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store does not support the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Backend-specific failure that has no dedicated variant.
    #[error("{backend} error: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` for errors that mean "the object is not here".
    pub fn is_bad_object(&self) -> bool {
        matches!(self, Self::BadObject(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
