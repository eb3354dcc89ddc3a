use odb_store::StoreError;
use odb_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid pack magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("pack checksum does not match its index")]
    ChecksumMismatch,

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("CRC32 mismatch for object {id}")]
    CrcMismatch { id: ObjectId },

    #[error("object {id} is stored as a delta against {base}; delta resolution is not supported")]
    DeltaUnsupported { id: ObjectId, base: ObjectId },

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index corrupted: {0}")]
    IndexCorrupted(String),
}

pub type PackResult<T> = Result<T, PackError>;

impl From<PackError> for StoreError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::Io(e) => StoreError::Io(e),
            PackError::CrcMismatch { id } => StoreError::CorruptObject {
                id,
                reason: "pack entry CRC32 mismatch".into(),
            },
            e @ PackError::DeltaUnsupported { .. } => StoreError::Unsupported(e.to_string()),
            other => StoreError::Backend {
                backend: "pack",
                reason: other.to_string(),
            },
        }
    }
}
