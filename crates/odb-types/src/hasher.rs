use crate::kind::ObjectKind;
use crate::object::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"odb-blob-v1"`) that is prepended
/// to every hash computation, so a blob and a tree with identical bytes get
/// different object IDs.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for blob objects.
    pub const BLOB: Self = Self {
        domain: "odb-blob-v1",
    };
    /// Hasher for tree objects.
    pub const TREE: Self = Self {
        domain: "odb-tree-v1",
    };
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self {
        domain: "odb-commit-v1",
    };
    /// Hasher for tag objects.
    pub const TAG: Self = Self {
        domain: "odb-tag-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// The hasher responsible for objects of `kind`.
    pub fn for_kind(kind: ObjectKind) -> &'static Self {
        match kind {
            ObjectKind::Blob => &Self::BLOB,
            ObjectKind::Tree => &Self::TREE,
            ObjectKind::Commit => &Self::COMMIT,
            ObjectKind::Tag => &Self::TAG,
        }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
