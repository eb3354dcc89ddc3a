use std::path::{Path, PathBuf};

use odb_store::{ObjectDb, ObjectInfo, ObjectStream, ShaIter, StoreResult};
use odb_types::{HexPrefix, ObjectId};
use tracing::{debug, warn};

use crate::compound::CompoundDb;
use crate::config::OdbConfig;
use crate::factory::FactoryTable;

/// Read-only store over the external object roots named in an alternates
/// file.
///
/// Each non-empty line that does not start with `#` names another objects
/// directory; relative lines resolve against the objects directory that owns
/// the file. Every root becomes a nested [`CompoundDb`], so an alternate's own
/// packs and alternates are honoured too, up to a fixed nesting depth.
pub struct AlternateDb {
    path: PathBuf,
    roots: Vec<CompoundDb>,
}

impl AlternateDb {
    /// Open the alternates file at `path`.
    ///
    /// Never fails: an unreadable file, a missing root, or a root that does
    /// not form a valid store is logged and skipped. At `depth` zero the file
    /// is ignored entirely.
    pub fn open(path: &Path, objects_dir: &Path, config: &OdbConfig, depth: usize) -> Self {
        let mut db = Self {
            path: path.to_path_buf(),
            roots: Vec::new(),
        };
        if depth == 0 {
            warn!("alternates nested too deeply, ignoring {:?}", path);
            return db;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot read alternates file {:?}: {}", path, e);
                return db;
            }
        };

        let own_root = canonical(objects_dir);
        let mut seen = vec![own_root];
        for entry in parse_alternates(&text) {
            let root = objects_dir.join(entry);
            let key = canonical(&root);
            if seen.contains(&key) {
                debug!(root = ?root, "skipping repeated alternate");
                continue;
            }
            seen.push(key);

            let nested =
                CompoundDb::with_factories(&root, FactoryTable::standard_at_depth(config, depth - 1));
            match nested.databases() {
                Ok(_) => db.roots.push(nested),
                Err(e) => warn!("skipping alternate {:?}: {}", root, e),
            }
        }

        debug!(file = ?path, roots = db.roots.len(), "loaded alternates");
        db
    }

    /// The alternates file this store was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The nested stores, in file order.
    pub fn roots(&self) -> &[CompoundDb] {
        &self.roots
    }
}

/// Entries of an alternates file, in order.
fn parse_alternates(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl ObjectDb for AlternateDb {
    fn read_info(&self, id: &ObjectId) -> StoreResult<Option<ObjectInfo>> {
        for root in &self.roots {
            if let Some(info) = root.read_info(id)? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    fn read_stream(&self, id: &ObjectId) -> StoreResult<Option<ObjectStream>> {
        for root in &self.roots {
            if let Some(stream) = root.read_stream(id)? {
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    fn size(&self) -> StoreResult<usize> {
        let mut total = 0;
        for root in &self.roots {
            total += root.size()?;
        }
        Ok(total)
    }

    fn sha_iter(&self) -> ShaIter<'_> {
        Box::new(self.roots.iter().flat_map(|r| r.sha_iter()))
    }

    fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        for root in &self.roots {
            if root.has_object(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn ids_with_prefix(&self, prefix: &HexPrefix) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for root in &self.roots {
            ids.extend(root.ids_with_prefix(prefix)?);
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for AlternateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlternateDb")
            .field("path", &self.path)
            .field("roots", &self.roots.iter().map(|r| r.root_path()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_store::{IStream, LooseObjectDb, ObjectDbWrite};
    use odb_types::ObjectKind;

    fn store_blob(root: &Path, data: &str) -> ObjectId {
        std::fs::create_dir_all(root).unwrap();
        LooseObjectDb::new(root)
            .store(IStream::from_bytes(ObjectKind::Blob, data.as_bytes()))
            .unwrap()
            .id
    }

    fn write_alternates(objects_dir: &Path, text: &str) -> PathBuf {
        let info = objects_dir.join("info");
        std::fs::create_dir_all(&info).unwrap();
        let path = info.join("alternates");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn open(objects_dir: &Path, file: &Path) -> AlternateDb {
        let config = OdbConfig::default();
        AlternateDb::open(file, objects_dir, &config, config.max_alternate_depth)
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let entries: Vec<&str> = parse_alternates("# shared\n\n  /a/objects  \n../b\n#x\n").collect();
        assert_eq!(entries, vec!["/a/objects", "../b"]);
    }

    #[test]
    fn absolute_and_relative_entries() {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("repo/objects");
        let abs = dir.path().join("abs/objects");
        let rel = dir.path().join("repo/rel");
        let a = store_blob(&abs, "absolute");
        let r = store_blob(&rel, "relative");
        std::fs::create_dir_all(&objects).unwrap();

        let file = write_alternates(&objects, &format!("{}\n../rel\n", abs.display()));
        let db = open(&objects, &file);

        assert_eq!(db.roots().len(), 2);
        assert_eq!(db.size().unwrap(), 2);
        assert_eq!(db.stream(&a).unwrap().into_bytes(), b"absolute");
        assert_eq!(db.stream(&r).unwrap().into_bytes(), b"relative");
        assert!(db.writer().is_none());
    }

    #[test]
    fn duplicates_and_missing_roots_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        let shared = dir.path().join("shared");
        std::fs::create_dir_all(&objects).unwrap();
        store_blob(&shared, "once");

        let text = format!(
            "{0}\n{1}\n{0}\n",
            shared.display(),
            dir.path().join("missing").display()
        );
        let file = write_alternates(&objects, &text);
        let db = open(&objects, &file);

        assert_eq!(db.roots().len(), 1);
        assert_eq!(db.size().unwrap(), 1);
    }

    #[test]
    fn self_reference_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        std::fs::create_dir_all(&objects).unwrap();
        let file = write_alternates(&objects, ".\n");
        assert!(open(&objects, &file).roots().is_empty());
    }

    #[test]
    fn unreadable_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path(), &dir.path().join("info/alternates"));
        assert!(db.roots().is_empty());
        assert_eq!(db.size().unwrap(), 0);
        assert_eq!(db.sha_iter().count(), 0);
    }

    #[test]
    fn zero_depth_ignores_file() {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        let other = dir.path().join("other");
        store_blob(&other, "unreachable");
        std::fs::create_dir_all(&objects).unwrap();
        let file = write_alternates(&objects, &other.display().to_string());

        let db = AlternateDb::open(&file, &objects, &OdbConfig::default(), 0);
        assert!(db.roots().is_empty());
    }

    #[test]
    fn nested_alternates_are_followed() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        let deep = store_blob(&c, "two hops away");
        write_alternates(&b, &c.display().to_string());
        let file = write_alternates(&a, &b.display().to_string());

        let db = open(&a, &file);
        assert!(db.has_object(&deep).unwrap());
        let prefix = HexPrefix::parse(&deep.to_hex()[..10]).unwrap();
        assert_eq!(db.ids_with_prefix(&prefix).unwrap(), vec![deep]);
    }

    #[test]
    fn cycles_terminate() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let in_b = store_blob(&b, "in b");
        std::fs::create_dir_all(&a).unwrap();
        write_alternates(&b, &a.display().to_string());
        let file = write_alternates(&a, &b.display().to_string());

        let db = open(&a, &file);
        assert_eq!(db.roots().len(), 1);
        assert!(db.has_object(&in_b).unwrap());
    }
}
