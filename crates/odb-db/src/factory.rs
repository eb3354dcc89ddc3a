use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use odb_pack::PackedDb;
use odb_store::{LooseObjectDb, ObjectDb, StoreResult};
use serde::Serialize;

use crate::alternates::AlternateDb;
use crate::config::OdbConfig;

/// Builds a sub-store rooted at the given (existing) path.
pub type StoreFactory = Arc<dyn Fn(&Path) -> StoreResult<Box<dyn ObjectDb>> + Send + Sync>;

/// The kinds of store a compound store can be composed of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubStoreKind {
    /// Consolidated archive store (`pack/`).
    Packed,
    /// One-file-per-object store; the only writable kind.
    Loose,
    /// External object roots listed in `info/alternates`.
    Alternates,
}

impl SubStoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Packed => "packed",
            Self::Loose => "loose",
            Self::Alternates => "alternates",
        }
    }
}

impl fmt::Display for SubStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the discovery table.
#[derive(Clone)]
pub struct SubStoreDescriptor {
    pub kind: SubStoreKind,
    /// Path relative to the objects root whose existence activates the store.
    pub relative_path: PathBuf,
    pub factory: StoreFactory,
}

impl SubStoreDescriptor {
    pub fn new(
        kind: SubStoreKind,
        relative_path: impl Into<PathBuf>,
        factory: impl Fn(&Path) -> StoreResult<Box<dyn ObjectDb>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            relative_path: relative_path.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for SubStoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubStoreDescriptor")
            .field("kind", &self.kind)
            .field("relative_path", &self.relative_path)
            .finish_non_exhaustive()
    }
}

/// Ordered discovery table: earlier rows take precedence on reads.
#[derive(Clone, Debug)]
pub struct FactoryTable {
    descriptors: Vec<SubStoreDescriptor>,
}

impl FactoryTable {
    pub fn new(descriptors: Vec<SubStoreDescriptor>) -> Self {
        Self { descriptors }
    }

    /// The pack, loose, alternates table described by `config`.
    pub fn standard(config: &OdbConfig) -> Self {
        Self::standard_at_depth(config, config.max_alternate_depth)
    }

    /// Standard table whose alternate store may nest `depth` more levels.
    pub(crate) fn standard_at_depth(config: &OdbConfig, depth: usize) -> Self {
        let level = config.compression_level;
        let alt_config = config.clone();
        // Relative alternates resolve against the objects root, so remember
        // how far the alternates file sits below it.
        let alt_depth_below_root = Path::new(&config.alternates_file).components().count();

        Self::new(vec![
            SubStoreDescriptor::new(SubStoreKind::Packed, &config.pack_dir, |path| {
                Ok(Box::new(PackedDb::open(path)?) as Box<dyn ObjectDb>)
            }),
            SubStoreDescriptor::new(SubStoreKind::Loose, &config.loose_dir, move |path| {
                let db = LooseObjectDb::new(path).with_compression_level(level);
                Ok(Box::new(db) as Box<dyn ObjectDb>)
            }),
            SubStoreDescriptor::new(
                SubStoreKind::Alternates,
                &config.alternates_file,
                move |path| {
                    let objects_dir = path
                        .ancestors()
                        .nth(alt_depth_below_root)
                        .unwrap_or(path);
                    Ok(Box::new(AlternateDb::open(path, objects_dir, &alt_config, depth))
                        as Box<dyn ObjectDb>)
                },
            ),
        ])
    }

    /// Replace the factory of every row of `kind`.
    pub fn with_factory(
        mut self,
        kind: SubStoreKind,
        factory: impl Fn(&Path) -> StoreResult<Box<dyn ObjectDb>> + Send + Sync + 'static,
    ) -> Self {
        let factory: StoreFactory = Arc::new(factory);
        for descriptor in self.descriptors.iter_mut().filter(|d| d.kind == kind) {
            descriptor.factory = Arc::clone(&factory);
        }
        self
    }

    /// Drop every row of `kind`.
    pub fn without(mut self, kind: SubStoreKind) -> Self {
        self.descriptors.retain(|d| d.kind != kind);
        self
    }

    pub fn descriptors(&self) -> &[SubStoreDescriptor] {
        &self.descriptors
    }
}

impl Default for FactoryTable {
    fn default() -> Self {
        Self::standard(&OdbConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_store::InMemoryObjectDb;

    fn kinds(table: &FactoryTable) -> Vec<SubStoreKind> {
        table.descriptors().iter().map(|d| d.kind).collect()
    }

    #[test]
    fn standard_table_order_and_paths() {
        let table = FactoryTable::default();
        assert_eq!(
            kinds(&table),
            vec![SubStoreKind::Packed, SubStoreKind::Loose, SubStoreKind::Alternates]
        );
        let paths: Vec<&Path> = table
            .descriptors()
            .iter()
            .map(|d| d.relative_path.as_path())
            .collect();
        assert_eq!(
            paths,
            vec![Path::new("pack"), Path::new(""), Path::new("info/alternates")]
        );
    }

    #[test]
    fn table_follows_config() {
        let config = OdbConfig {
            pack_dir: "archives".into(),
            ..OdbConfig::default()
        };
        let table = FactoryTable::standard(&config);
        assert_eq!(table.descriptors()[0].relative_path, PathBuf::from("archives"));
    }

    #[test]
    fn with_factory_replaces_only_that_kind() {
        let table = FactoryTable::default()
            .with_factory(SubStoreKind::Loose, |_| {
                Ok(Box::new(InMemoryObjectDb::read_only()) as Box<dyn ObjectDb>)
            });
        let dir = tempfile::tempdir().unwrap();

        let loose = (table.descriptors()[1].factory)(dir.path()).unwrap();
        assert!(loose.writer().is_none());

        let packed = (table.descriptors()[0].factory)(dir.path()).unwrap();
        assert_eq!(packed.size().unwrap(), 0);
    }

    #[test]
    fn without_drops_rows() {
        let table = FactoryTable::default().without(SubStoreKind::Alternates);
        assert_eq!(kinds(&table), vec![SubStoreKind::Packed, SubStoreKind::Loose]);
    }

    #[test]
    fn kind_display() {
        assert_eq!(SubStoreKind::Packed.to_string(), "packed");
        assert_eq!(SubStoreKind::Alternates.as_str(), "alternates");
    }
}
