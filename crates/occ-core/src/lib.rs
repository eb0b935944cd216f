//! Optimistic-concurrency retry core.
//!
//! This crate provides:
//! - `RetryPolicy` - Attempt budget and exponential backoff with jitter
//! - `ConflictRetrier` - Read-modify-write loop that retries on version conflicts
//! - `CancelToken` - Cooperative cancellation observed between attempts and during sleeps
//! - `Sleeper` / `AsyncSleeper` - Pluggable backoff sleeping
//! - `VersionedStore` / `AsyncVersionedStore` - Collaborator traits for remote stores
//!
//! # Example
//!
//! ```rust,ignore
//! use occ_core::{ConflictRetrier, RetryPolicy};
//!
//! let retrier = ConflictRetrier::new(RetryPolicy::default())?;
//! let updated = retrier.update_in(&store, &key, |mut deployment| {
//!     deployment.spec.replicas = 3;
//!     deployment
//! })?;
//! ```

mod cancel;
mod error;
mod policy;
mod retrier;
mod sleeper;
mod store;

pub use cancel::*;
pub use error::*;
pub use policy::*;
pub use retrier::*;
pub use sleeper::*;
pub use store::*;
