//! Compound object database for odb.
//!
//! A repository's objects directory can hold several kinds of store at once:
//! packs under `pack/`, loose objects at the root itself, and external roots
//! listed in `info/alternates`. [`CompoundDb`] discovers which of them exist,
//! composes them in that precedence order, and presents them as one
//! [`ObjectDb`](odb_store::ObjectDb) that writes to the loose store only.
//!
//! # Opening
//!
//! - [`CompoundDb::new`] takes the objects root directly.
//! - [`ObjectRepository::open`] accepts either `<repo>.git` or
//!   `<repo>.git/objects` and resolves both to the same root.
//!
//! Discovery is deferred to the first operation and runs exactly once per
//! instance. Which stores exist, and how they are built, is controlled by a
//! [`FactoryTable`], normally derived from an [`OdbConfig`].

pub mod alternates;
pub mod compound;
pub mod config;
pub mod error;
pub mod factory;
pub mod resolver;

pub use alternates::AlternateDb;
pub use compound::{CompoundDb, SubStore};
pub use config::OdbConfig;
pub use error::{ConfigError, ConfigResult};
pub use factory::{FactoryTable, StoreFactory, SubStoreDescriptor, SubStoreKind};
pub use resolver::{ObjectRepository, RepositoryLocation, GIT_DIR_SUFFIX, OBJECTS_DIR_NAME};
