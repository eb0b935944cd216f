//! Deployment operations against a versioned store.
//!
//! Commands handle prompts and output; everything here is plain store and
//! retrier work so it can be exercised against a `MemoryStore`.

use occ_core::{CancelToken, ConflictRetrier, RetryError, Sleeper, VersionedStore};
use occ_store::{Object, ObjectKey, StoreError};
use serde::Serialize;
use tracing::info;

use crate::deployment::{DeploymentError, DeploymentSpec};

/// A store of deployments.
pub trait DeploymentStore:
    VersionedStore<Key = ObjectKey, Resource = Object<DeploymentSpec>, Error = StoreError>
{
    /// Store a new deployment.
    fn create(&self, object: Object<DeploymentSpec>) -> Result<Object<DeploymentSpec>, StoreError>;
}

impl DeploymentStore for occ_store::FileStore<DeploymentSpec> {
    fn create(&self, object: Object<DeploymentSpec>) -> Result<Object<DeploymentSpec>, StoreError> {
        occ_store::FileStore::create(self, object)
    }
}

impl DeploymentStore for occ_store::MemoryStore<DeploymentSpec> {
    fn create(&self, object: Object<DeploymentSpec>) -> Result<Object<DeploymentSpec>, StoreError> {
        occ_store::MemoryStore::create(self, object)
    }
}

/// Summary of a stored deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStatus {
    pub name: String,
    pub namespace: String,
    pub image: Option<String>,
    pub replicas: u32,
    pub resource_version: u64,
    pub generation: u64,
}

impl From<&Object<DeploymentSpec>> for DeploymentStatus {
    fn from(object: &Object<DeploymentSpec>) -> Self {
        Self {
            name: object.metadata.name.clone(),
            namespace: object.metadata.namespace.clone(),
            image: object.spec.image().map(str::to_string),
            replicas: object.spec.replicas,
            resource_version: object.metadata.resource_version.0,
            generation: object.metadata.generation,
        }
    }
}

/// Create a deployment. Fails if one already exists under `key`.
pub fn create<St: DeploymentStore>(
    store: &St,
    key: &ObjectKey,
    spec: DeploymentSpec,
) -> Result<Object<DeploymentSpec>, anyhow::Error> {
    if spec.image().map_or(true, |image| image.trim().is_empty()) {
        return Err(DeploymentError::EmptyImage.into());
    }

    let object = Object::new(key.clone(), spec);
    let created = store.create(object)?;
    info!(key = %key, replicas = created.spec.replicas, "deployment created");
    Ok(created)
}

/// Point the first container at `image`, retrying on version conflicts.
pub fn upgrade<St, S>(
    store: &St,
    retrier: &ConflictRetrier<S>,
    key: &ObjectKey,
    image: &str,
    cancel: &CancelToken,
) -> Result<Object<DeploymentSpec>, RetryError<StoreError>>
where
    St: DeploymentStore,
    S: Sleeper,
{
    let updated = retrier.update_in_with_cancel(
        store,
        key,
        |object| object.map_spec(|spec| spec.set_image(image)),
        cancel,
    )?;
    info!(key = %key, image, version = %updated.version(), "deployment upgraded");
    Ok(updated)
}

/// Set the replica count, retrying on version conflicts.
pub fn scale<St, S>(
    store: &St,
    retrier: &ConflictRetrier<S>,
    key: &ObjectKey,
    replicas: u32,
    cancel: &CancelToken,
) -> Result<Object<DeploymentSpec>, RetryError<StoreError>>
where
    St: DeploymentStore,
    S: Sleeper,
{
    let updated = retrier.update_in_with_cancel(
        store,
        key,
        |object| object.map_spec(|spec| spec.with_replicas(replicas)),
        cancel,
    )?;
    info!(key = %key, replicas, version = %updated.version(), "deployment scaled");
    Ok(updated)
}

/// Read the current status of a deployment.
pub fn status<St: DeploymentStore>(
    store: &St,
    key: &ObjectKey,
) -> Result<DeploymentStatus, StoreError> {
    store.get(key).map(|object| DeploymentStatus::from(&object))
}
