//! Version bookkeeping shared by every store backend.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::resource::{Object, ObjectKey, ResourceVersion};

/// Objects plus the store-wide revision counter.
#[derive(Debug, Clone)]
pub(crate) struct State<T> {
    revision: ResourceVersion,
    objects: BTreeMap<ObjectKey, Object<T>>,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            revision: ResourceVersion::NONE,
            objects: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> State<T> {
    pub(crate) fn get(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    pub(crate) fn create(&mut self, mut object: Object<T>) -> Result<Object<T>, StoreError> {
        let key = object.key();
        if self.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        self.revision = self.revision.next();
        object.metadata.resource_version = self.revision;
        object.metadata.generation = 1;
        self.objects.insert(key, object.clone());
        Ok(object)
    }

    /// Write `object` if its version still matches the stored one.
    ///
    /// The generation only moves when the spec actually changed.
    pub(crate) fn update(&mut self, mut object: Object<T>) -> Result<Object<T>, StoreError> {
        let key = object.key();
        let stored = self
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if stored.metadata.resource_version != object.metadata.resource_version {
            return Err(StoreError::Conflict {
                key,
                submitted: object.metadata.resource_version,
                stored: stored.metadata.resource_version,
            });
        }

        let generation = if stored.spec == object.spec {
            stored.metadata.generation
        } else {
            stored.metadata.generation + 1
        };

        self.revision = self.revision.next();
        object.metadata.resource_version = self.revision;
        object.metadata.generation = generation;
        self.objects.insert(key, object.clone());
        Ok(object)
    }

    pub(crate) fn delete(&mut self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        self.objects
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    pub(crate) fn list(&self, namespace: Option<&str>) -> Vec<Object<T>> {
        self.objects
            .values()
            .filter(|object| namespace.map_or(true, |ns| object.metadata.namespace == ns))
            .cloned()
            .collect()
    }

    pub(crate) fn revision(&self) -> ResourceVersion {
        self.revision
    }
}

/// On-disk layout of a state file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub(crate) struct StateFile<T> {
    pub(crate) revision: ResourceVersion,
    #[serde(default)]
    pub(crate) objects: Vec<Object<T>>,
}

impl<T> From<StateFile<T>> for State<T> {
    fn from(file: StateFile<T>) -> Self {
        let objects = file
            .objects
            .into_iter()
            .map(|object| (object.key(), object))
            .collect();
        Self {
            revision: file.revision,
            objects,
        }
    }
}

impl<T> From<State<T>> for StateFile<T> {
    fn from(state: State<T>) -> Self {
        Self {
            revision: state.revision,
            objects: state.objects.into_values().collect(),
        }
    }
}
