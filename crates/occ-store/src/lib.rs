//! Versioned object stores with optimistic-concurrency updates.
//!
//! This crate provides:
//! - `Object` / `ObjectMeta` - Named objects carrying a resource version
//! - `MemoryStore` - Shared in-process store
//! - `FileStore` - JSON state file with locked, atomic replacement
//! - `StoreError` - Store failures, with conflict classification
//!
//! Both stores implement `occ_core::VersionedStore`, so they can be driven
//! directly by a `ConflictRetrier`.

mod error;
mod file;
mod lock;
mod memory;
mod resource;
mod state;

pub use error::*;
pub use file::*;
pub use memory::*;
pub use resource::*;
