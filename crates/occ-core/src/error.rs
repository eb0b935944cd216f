//! Error types for the retry core.

use std::time::Duration;

use thiserror::Error;

/// Error returned when a [`crate::RetryPolicy`] is unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff multiplier must be a finite number >= 1, got {0}")]
    InvalidMultiplier(f64),

    #[error("jitter fraction must be within [0, 1], got {0}")]
    InvalidJitter(f64),

    #[error("max backoff {max:?} is below initial backoff {initial:?}")]
    BackoffBounds { initial: Duration, max: Duration },
}

/// Terminal outcome of a failed retry loop.
///
/// Conflicts that were retried never surface here; only the state the loop
/// ended in does.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// A `get` or `update` failed with an error that is not a version conflict.
    #[error("attempt {attempt} failed")]
    Fatal {
        /// Attempt the failure happened on (1-indexed).
        attempt: u32,
        /// Error reported by the store.
        source: E,
    },

    /// Every attempt ended in a version conflict.
    #[error("gave up after {attempts} conflicting attempts")]
    Exhausted {
        /// Number of attempts performed.
        attempts: u32,
        /// Conflict reported by the last attempt.
        #[source]
        last: E,
    },

    /// The caller cancelled the loop.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Number of attempts performed before cancellation.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts performed before the loop ended.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// Check if the loop ran out of attempts.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Check if the loop was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if the loop stopped on a non-conflict error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Take the underlying store error, if there is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Fatal { source, .. } => Some(source),
            Self::Exhausted { last, .. } => Some(last),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Tagged outcome of one attempt, used to drive the retry loop.
#[derive(Debug)]
pub(crate) enum AttemptResult<T, E> {
    Success(T),
    Conflict(E),
    Fatal(E),
}

impl<T, E> AttemptResult<T, E> {
    /// Classify the result of an `update` call.
    pub(crate) fn classify(result: Result<T, E>, is_conflict: impl FnOnce(&E) -> bool) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if is_conflict(&err) => Self::Conflict(err),
            Err(err) => Self::Fatal(err),
        }
    }
}
