use std::path::{Path, PathBuf};

use odb_store::{ObjectDb, ObjectInfo, ObjectStream, ShaIter, StoreError, StoreResult};
use odb_types::{ContentHasher, HexPrefix, ObjectId};

use crate::error::PackResult;
use crate::reader::PackReader;

/// Read-only object store over every pack in a `pack/` directory.
///
/// Packs are loaded once, in file-name order; lookups consult them in that
/// order. Packs added to the directory later are not seen by this instance.
pub struct PackedDb {
    pack_dir: PathBuf,
    packs: Vec<PackReader>,
}

impl PackedDb {
    /// Load all `*.pack` files (with their `.idx`) from `pack_dir`.
    ///
    /// Packs that fail to open are skipped with a warning.
    pub fn open(pack_dir: &Path) -> PackResult<Self> {
        let mut pack_paths = Vec::new();
        if pack_dir.is_dir() {
            for entry in std::fs::read_dir(pack_dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|e| e == "pack") {
                    pack_paths.push(path);
                }
            }
        }
        pack_paths.sort();

        let mut packs = Vec::with_capacity(pack_paths.len());
        for path in pack_paths {
            match PackReader::open(&path) {
                Ok(reader) => packs.push(reader),
                Err(e) => {
                    tracing::warn!("skipping corrupt pack {:?}: {}", path, e);
                }
            }
        }
        tracing::debug!(dir = ?pack_dir, packs = packs.len(), "loaded pack directory");

        Ok(Self {
            pack_dir: pack_dir.to_path_buf(),
            packs,
        })
    }

    /// Build from already opened readers.
    pub fn from_readers(pack_dir: impl Into<PathBuf>, packs: Vec<PackReader>) -> Self {
        Self {
            pack_dir: pack_dir.into(),
            packs,
        }
    }

    pub fn pack_dir(&self) -> &Path {
        &self.pack_dir
    }

    /// Number of loaded packs.
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    pub fn packs(&self) -> &[PackReader] {
        &self.packs
    }
}

impl ObjectDb for PackedDb {
    fn read_info(&self, id: &ObjectId) -> StoreResult<Option<ObjectInfo>> {
        for pack in &self.packs {
            if let Some((kind, size)) = pack.read_header(id)? {
                return Ok(Some(ObjectInfo::new(*id, kind, size)));
            }
        }
        Ok(None)
    }

    fn read_stream(&self, id: &ObjectId) -> StoreResult<Option<ObjectStream>> {
        for pack in &self.packs {
            if let Some((kind, data)) = pack.read_object(id)? {
                let computed = ContentHasher::for_kind(kind).hash(&data);
                if computed != *id {
                    return Err(StoreError::HashMismatch { id: *id, computed });
                }
                let info = ObjectInfo::new(*id, kind, data.len() as u64);
                return Ok(Some(ObjectStream::new(info, data)));
            }
        }
        Ok(None)
    }

    fn size(&self) -> StoreResult<usize> {
        Ok(self.packs.iter().map(|p| p.object_count()).sum())
    }

    fn sha_iter(&self) -> ShaIter<'_> {
        Box::new(
            self.packs
                .iter()
                .flat_map(|p| p.object_ids().iter().copied().map(Ok)),
        )
    }

    fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.packs.iter().any(|p| p.contains(id)))
    }

    fn ids_with_prefix(&self, prefix: &HexPrefix) -> StoreResult<Vec<ObjectId>> {
        Ok(self
            .packs
            .iter()
            .flat_map(|p| p.ids_with_prefix(prefix).iter().copied())
            .collect())
    }
}

impl std::fmt::Debug for PackedDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedDb")
            .field("pack_dir", &self.pack_dir)
            .field("pack_count", &self.packs.len())
            .finish()
    }
}
