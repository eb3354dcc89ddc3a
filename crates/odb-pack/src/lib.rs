//! Pack file format and archive store for odb.
//!
//! Provides zstd-compressed, CRC-checked pack files holding many objects,
//! and [`PackedDb`], the read-only store over a repository's `pack/`
//! directory.
//!
//! # Architecture
//!
//! - **Pack file** (`.pack`): concatenated compressed objects with a BLAKE3 checksum
//! - **Pack index** (`.idx`): fan-out table + sorted IDs for O(log n) lookups
//!   and prefix scans
//! - **PackWriter**: builds packs
//! - **PackReader**: random-access reading of one memory-mapped pack
//! - **PackedDb**: every pack in a directory behind the [`odb_store::ObjectDb`] contract

pub mod db;
pub mod entry;
pub mod error;
pub mod index;
pub mod reader;
pub mod writer;

pub use db::PackedDb;
pub use entry::{PackEntry, PackObjectKind};
pub use error::{PackError, PackResult};
pub use index::PackIndex;
pub use reader::PackReader;
pub use writer::{PackFile, PackWriter};
