//! Versioned object model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Store-wide revision stamped on every write.
///
/// Versions only ever grow; `ResourceVersion::NONE` marks an object that has
/// not been written yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceVersion(pub u64);

impl ResourceVersion {
    /// Version of an object that was never stored.
    pub const NONE: Self = Self(0);

    /// The version following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespaced object name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace.
    pub namespace: String,
    /// Name within the namespace.
    pub name: String,
}

impl ObjectKey {
    /// Create a new key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Object metadata maintained by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Namespace.
    pub namespace: String,
    /// Name within the namespace.
    pub name: String,
    /// Version observed when the object was read.
    #[serde(default)]
    pub resource_version: ResourceVersion,
    /// Number of spec changes, starting at 1 on creation.
    #[serde(default)]
    pub generation: u64,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create metadata for a not-yet-stored object.
    pub fn new(key: ObjectKey) -> Self {
        Self {
            namespace: key.namespace,
            name: key.name,
            resource_version: ResourceVersion::NONE,
            generation: 0,
            labels: BTreeMap::new(),
        }
    }

    /// Key of the object.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// A named, versioned object with a typed spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object<T> {
    /// Store-maintained metadata.
    pub metadata: ObjectMeta,
    /// User-owned desired state.
    pub spec: T,
}

impl<T> Object<T> {
    /// Create a new, unversioned object.
    pub fn new(key: ObjectKey, spec: T) -> Self {
        Self {
            metadata: ObjectMeta::new(key),
            spec,
        }
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Key of the object.
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    /// Version the object was read at.
    pub fn version(&self) -> ResourceVersion {
        self.metadata.resource_version
    }

    /// Replace the spec, keeping metadata.
    pub fn map_spec(mut self, f: impl FnOnce(T) -> T) -> Self {
        self.spec = f(self.spec);
        self
    }
}
