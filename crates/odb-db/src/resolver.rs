use std::ops::Deref;
use std::path::{Component, Path, PathBuf};

use odb_store::{StoreError, StoreResult};

use crate::compound::CompoundDb;
use crate::config::OdbConfig;
use crate::factory::FactoryTable;

/// Name of the object-storage directory inside a repository directory.
pub const OBJECTS_DIR_NAME: &str = "objects";

/// Suffix every repository metadata directory name carries.
pub const GIT_DIR_SUFFIX: &str = ".git";

/// A repository metadata directory and the objects root inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryLocation {
    git_dir: PathBuf,
    objects_dir: PathBuf,
}

impl RepositoryLocation {
    /// Resolve either `<repo>.git` or `<repo>.git/objects`.
    ///
    /// Purely lexical: the paths are not required to exist. Fails with
    /// [`StoreError::InvalidGitDirectory`] when the metadata directory name
    /// does not end in `.git`.
    pub fn resolve(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = normalize(path.as_ref());

        let names_objects_dir = path.file_name().is_some_and(|name| name == OBJECTS_DIR_NAME);
        let (git_dir, objects_dir) = if names_objects_dir {
            let git_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (git_dir, path)
        } else {
            let objects_dir = path.join(OBJECTS_DIR_NAME);
            (path, objects_dir)
        };

        let is_git_dir = git_dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(GIT_DIR_SUFFIX));
        if !is_git_dir {
            return Err(StoreError::InvalidGitDirectory(git_dir));
        }

        Ok(Self {
            git_dir,
            objects_dir,
        })
    }

    /// The repository metadata directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The objects root.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

/// Lexically drop `.` components and fold `..` into the preceding name.
///
/// A `..` directly under the root is dropped; leading `..` components of a
/// relative path are kept.
fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

/// A compound store opened through a repository directory.
///
/// Dereferences to the [`CompoundDb`] rooted at the objects directory.
#[derive(Debug)]
pub struct ObjectRepository {
    location: RepositoryLocation,
    db: CompoundDb,
}

impl ObjectRepository {
    /// Open with the standard factory table.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, FactoryTable::default())
    }

    /// Open with the standard table for `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: &OdbConfig) -> StoreResult<Self> {
        Self::open_with(path, FactoryTable::standard(config))
    }

    /// Open with a caller-supplied factory table.
    pub fn open_with(path: impl AsRef<Path>, table: FactoryTable) -> StoreResult<Self> {
        let location = RepositoryLocation::resolve(path)?;
        let db = CompoundDb::with_factories(location.objects_dir(), table);
        Ok(Self { location, db })
    }

    /// The repository metadata directory, as opposed to the objects root.
    pub fn git_dir(&self) -> &Path {
        self.location.git_dir()
    }

    pub fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    pub fn db(&self) -> &CompoundDb {
        &self.db
    }
}

impl Deref for ObjectRepository {
    type Target = CompoundDb;

    fn deref(&self) -> &CompoundDb {
        &self.db
    }
}
