//! Collaborator traits for versioned remote stores.

use async_trait::async_trait;

/// A store holding versioned resources with a conditional update.
///
/// `update` must fail with an error for which [`VersionedStore::is_conflict`]
/// returns `true` when the submitted resource's version no longer matches
/// the stored one.
pub trait VersionedStore {
    /// Key identifying a resource.
    type Key: ?Sized;
    /// Resource value, carrying its own version token.
    type Resource;
    /// Store error.
    type Error;

    /// Fetch the current state of a resource.
    fn get(&self, key: &Self::Key) -> Result<Self::Resource, Self::Error>;

    /// Conditionally write a resource.
    fn update(&self, resource: Self::Resource) -> Result<Self::Resource, Self::Error>;

    /// Classify an error as a retryable version conflict.
    fn is_conflict(error: &Self::Error) -> bool;
}

/// Async counterpart of [`VersionedStore`].
#[async_trait]
pub trait AsyncVersionedStore: Send + Sync {
    /// Key identifying a resource.
    type Key: ?Sized + Sync;
    /// Resource value, carrying its own version token.
    type Resource: Send;
    /// Store error.
    type Error: Send;

    /// Fetch the current state of a resource.
    async fn get(&self, key: &Self::Key) -> Result<Self::Resource, Self::Error>;

    /// Conditionally write a resource.
    async fn update(&self, resource: Self::Resource) -> Result<Self::Resource, Self::Error>;

    /// Classify an error as a retryable version conflict.
    fn is_conflict(error: &Self::Error) -> bool;
}
