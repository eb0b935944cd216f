//! Shared in-process store.

use std::sync::Arc;

use async_trait::async_trait;
use occ_core::{AsyncVersionedStore, VersionedStore};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::resource::{Object, ObjectKey, ResourceVersion};
use crate::state::State;

/// In-memory versioned store.
///
/// Cloning returns another handle to the same objects, so a store can be
/// handed to many threads or tasks contending on the same keys.
#[derive(Debug)]
pub struct MemoryStore<T> {
    state: Arc<RwLock<State<T>>>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl<T: Clone + PartialEq> MemoryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new object.
    pub fn create(&self, object: Object<T>) -> Result<Object<T>, StoreError> {
        let created = self.state.write().create(object)?;
        debug!(key = %created.key(), version = %created.version(), "object created");
        Ok(created)
    }

    /// Fetch an object.
    pub fn get(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        self.state.read().get(key)
    }

    /// Write an object if it was not modified since it was read.
    pub fn update(&self, object: Object<T>) -> Result<Object<T>, StoreError> {
        let updated = self.state.write().update(object)?;
        debug!(key = %updated.key(), version = %updated.version(), "object updated");
        Ok(updated)
    }

    /// Remove an object.
    pub fn delete(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        self.state.write().delete(key)
    }

    /// List objects, optionally limited to one namespace.
    pub fn list(&self, namespace: Option<&str>) -> Vec<Object<T>> {
        self.state.read().list(namespace)
    }

    /// Latest revision handed out.
    pub fn revision(&self) -> ResourceVersion {
        self.state.read().revision()
    }
}

impl<T: Clone + PartialEq> VersionedStore for MemoryStore<T> {
    type Key = ObjectKey;
    type Resource = Object<T>;
    type Error = StoreError;

    fn get(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        MemoryStore::get(self, key)
    }

    fn update(&self, resource: Object<T>) -> Result<Object<T>, StoreError> {
        MemoryStore::update(self, resource)
    }

    fn is_conflict(error: &StoreError) -> bool {
        error.is_conflict()
    }
}

#[async_trait]
impl<T> AsyncVersionedStore for MemoryStore<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    type Key = ObjectKey;
    type Resource = Object<T>;
    type Error = StoreError;

    async fn get(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        MemoryStore::get(self, key)
    }

    async fn update(&self, resource: Object<T>) -> Result<Object<T>, StoreError> {
        MemoryStore::update(self, resource)
    }

    fn is_conflict(error: &StoreError) -> bool {
        error.is_conflict()
    }
}
