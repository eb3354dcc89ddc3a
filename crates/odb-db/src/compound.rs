use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use odb_store::{
    IStream, ObjectDb, ObjectDbWrite, ObjectInfo, ObjectStream, SharedSink, ShaIter, StoreError,
    StoreResult,
};
use odb_types::{HexPrefix, ObjectId};
use tracing::debug;

use crate::config::OdbConfig;
use crate::factory::{FactoryTable, SubStoreKind};

/// A discovered sub-store and where it was found.
pub struct SubStore {
    kind: SubStoreKind,
    path: PathBuf,
    db: Box<dyn ObjectDb>,
}

impl SubStore {
    pub fn kind(&self) -> SubStoreKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn db(&self) -> &dyn ObjectDb {
        self.db.as_ref()
    }
}

impl Deref for SubStore {
    type Target = dyn ObjectDb;

    fn deref(&self) -> &Self::Target {
        self.db.as_ref()
    }
}

impl fmt::Debug for SubStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubStore")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish()
    }
}

/// Result of discovery. `primary` indexes the writable loose store.
struct Composition {
    stores: Vec<SubStore>,
    primary: usize,
}

/// One logical object store over every sub-store found under a root.
///
/// Sub-stores are discovered on first use by walking the [`FactoryTable`] in
/// order and instantiating each row whose path exists under the root. The
/// result is cached for the lifetime of the instance; packs or alternates
/// added afterwards are only seen by a new instance.
///
/// Reads consult sub-stores in table order and return the first hit. Writes
/// go to the loose store alone.
pub struct CompoundDb {
    root: PathBuf,
    table: FactoryTable,
    composition: OnceLock<Composition>,
    init: Mutex<()>,
}

impl CompoundDb {
    /// Compound store over `root` using the standard table.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_factories(root, FactoryTable::default())
    }

    /// Compound store over `root` using the standard table for `config`.
    pub fn with_config(root: impl Into<PathBuf>, config: &OdbConfig) -> Self {
        Self::with_factories(root, FactoryTable::standard(config))
    }

    /// Compound store over `root` using a caller-supplied table.
    pub fn with_factories(root: impl Into<PathBuf>, table: FactoryTable) -> Self {
        Self {
            root: root.into(),
            table,
            composition: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The objects root this store was created on.
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Whether discovery has already succeeded.
    pub fn is_initialized(&self) -> bool {
        self.composition.get().is_some()
    }

    fn composition(&self) -> StoreResult<&Composition> {
        if let Some(composition) = self.composition.get() {
            return Ok(composition);
        }
        let _guard = self.init.lock().expect("lock poisoned");
        if let Some(composition) = self.composition.get() {
            return Ok(composition);
        }
        // A failure leaves the cell empty, so the next call retries.
        let composition = self.discover()?;
        Ok(self.composition.get_or_init(|| composition))
    }

    fn discover(&self) -> StoreResult<Composition> {
        let mut stores = Vec::new();
        let mut primary = None;

        for descriptor in self.table.descriptors() {
            let path = if descriptor.relative_path.as_os_str().is_empty() {
                self.root.clone()
            } else {
                self.root.join(&descriptor.relative_path)
            };
            if !path.exists() {
                continue;
            }
            let db = (descriptor.factory)(&path)?;
            if descriptor.kind == SubStoreKind::Loose && primary.is_none() {
                primary = Some(stores.len());
            }
            stores.push(SubStore {
                kind: descriptor.kind,
                path,
                db,
            });
        }

        if stores.is_empty() {
            return Err(StoreError::RootNotFound(self.root.clone()));
        }
        let Some(primary) = primary else {
            return Err(StoreError::MisconfiguredWritableStore {
                root: self.root.clone(),
                reason: "no loose store was found".into(),
            });
        };
        if stores[primary].writer().is_none() {
            return Err(StoreError::MisconfiguredWritableStore {
                root: self.root.clone(),
                reason: format!(
                    "loose store at {} does not support writes",
                    stores[primary].path.display()
                ),
            });
        }

        debug!(
            root = ?self.root,
            stores = ?stores.iter().map(|s| s.kind).collect::<Vec<_>>(),
            "discovered object stores"
        );
        Ok(Composition { stores, primary })
    }

    /// The discovered sub-stores, in precedence order.
    pub fn databases(&self) -> StoreResult<&[SubStore]> {
        Ok(&self.composition()?.stores)
    }

    /// Kinds and paths of the discovered sub-stores.
    pub fn layout(&self) -> StoreResult<Vec<(SubStoreKind, PathBuf)>> {
        Ok(self
            .databases()?
            .iter()
            .map(|s| (s.kind, s.path.clone()))
            .collect())
    }

    /// Kind of the store that receives writes.
    pub fn primary_kind(&self) -> StoreResult<SubStoreKind> {
        let composition = self.composition()?;
        Ok(composition.stores[composition.primary].kind)
    }

    fn primary(&self) -> StoreResult<&dyn ObjectDbWrite> {
        let composition = self.composition()?;
        let store = &composition.stores[composition.primary];
        store
            .writer()
            .ok_or_else(|| StoreError::MisconfiguredWritableStore {
                root: self.root.clone(),
                reason: format!("{} store lost its write capability", store.kind),
            })
    }

    /// Expand an abbreviated hex object name to the full ID.
    ///
    /// Every sub-store is consulted. Exactly one distinct match is required:
    /// none is [`StoreError::BadObject`], several is
    /// [`StoreError::AmbiguousObject`].
    pub fn partial_to_complete_sha(&self, partial_hex: &str) -> StoreResult<ObjectId> {
        let prefix = HexPrefix::parse(partial_hex)?;
        let mut found = BTreeSet::new();
        for store in self.databases()? {
            found.extend(store.ids_with_prefix(&prefix)?);
        }

        let mut candidates = found.into_iter();
        match (candidates.next(), candidates.len()) {
            (None, _) => Err(StoreError::BadObject(prefix.to_string())),
            (Some(id), 0) => Ok(id),
            (Some(_), rest) => Err(StoreError::AmbiguousObject {
                prefix: prefix.to_string(),
                candidates: rest + 1,
            }),
        }
    }
}

impl ObjectDb for CompoundDb {
    fn read_info(&self, id: &ObjectId) -> StoreResult<Option<ObjectInfo>> {
        for store in self.databases()? {
            if let Some(info) = store.read_info(id)? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    fn read_stream(&self, id: &ObjectId) -> StoreResult<Option<ObjectStream>> {
        for store in self.databases()? {
            if let Some(stream) = store.read_stream(id)? {
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    /// Sum over sub-stores. An object held by two sub-stores counts twice.
    fn size(&self) -> StoreResult<usize> {
        let mut total = 0;
        for store in self.databases()? {
            total += store.size()?;
        }
        Ok(total)
    }

    fn sha_iter(&self) -> ShaIter<'_> {
        match self.databases() {
            Ok(stores) => Box::new(stores.iter().flat_map(|s| s.sha_iter())),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    /// `None` only when the composition has no writable primary. Other
    /// discovery failures still hand out the writer so that `store` reports
    /// the underlying error.
    fn writer(&self) -> Option<&dyn ObjectDbWrite> {
        match self.primary() {
            Err(StoreError::MisconfiguredWritableStore { .. }) => None,
            _ => Some(self),
        }
    }

    fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        for store in self.databases()? {
            if store.has_object(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn ids_with_prefix(&self, prefix: &HexPrefix) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for store in self.databases()? {
            ids.extend(store.ids_with_prefix(prefix)?);
        }
        Ok(ids)
    }
}

impl ObjectDbWrite for CompoundDb {
    fn store(&self, istream: IStream) -> StoreResult<ObjectInfo> {
        self.primary()?.store(istream)
    }

    fn ostream(&self) -> StoreResult<Option<SharedSink>> {
        self.primary()?.ostream()
    }

    fn set_ostream(&self, sink: Option<SharedSink>) -> StoreResult<Option<SharedSink>> {
        self.primary()?.set_ostream(sink)
    }
}

impl fmt::Debug for CompoundDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundDb")
            .field("root", &self.root)
            .field("stores", &self.composition.get().map(|c| &c.stores))
            .finish()
    }
}
