//! Foundation types for the odb object database.
//!
//! Every other odb crate depends on `odb-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`ObjectKind`]: Blob, tree, commit, or tag
//! - [`HexPrefix`]: Abbreviated object name used for partial lookups
//! - [`ContentHasher`]: Domain-separated hasher that derives an `ObjectId`

pub mod error;
pub mod hasher;
pub mod kind;
pub mod object;
pub mod prefix;

pub use error::TypeError;
pub use hasher::ContentHasher;
pub use kind::ObjectKind;
pub use object::ObjectId;
pub use prefix::HexPrefix;
