//! Pluggable backoff sleeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cancel::CancelToken;

/// How a backoff sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full delay elapsed.
    Elapsed,
    /// The token was cancelled before or during the sleep.
    Cancelled,
}

/// Blocking sleep between attempts.
pub trait Sleeper: Send + Sync {
    /// Sleep for `delay` unless `cancel` fires first.
    fn sleep(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome;
}

/// Async sleep between attempts.
#[async_trait]
pub trait AsyncSleeper: Send + Sync {
    /// Sleep for `delay` unless `cancel` fires first.
    async fn sleep_async(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome;
}

/// Sleeper that parks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome {
        if cancel.wait_timeout(delay) {
            SleepOutcome::Cancelled
        } else {
            SleepOutcome::Elapsed
        }
    }
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl AsyncSleeper for TokioSleeper {
    async fn sleep_async(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome {
        if cancel.is_cancelled() {
            return SleepOutcome::Cancelled;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => SleepOutcome::Elapsed,
            _ = cancel.cancelled() => SleepOutcome::Cancelled,
        }
    }
}

/// Sleeper that records requested delays without waiting.
///
/// Clones share the same record. Useful in tests to assert backoff
/// schedules and to cancel at a precise point.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
    cancel_on: Option<usize>,
}

impl RecordingSleeper {
    /// Create a new recording sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token during the `n`th sleep (1-indexed).
    pub fn cancel_on_sleep(mut self, n: usize) -> Self {
        self.cancel_on = Some(n);
        self
    }

    /// Delays requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Number of sleeps requested so far.
    pub fn count(&self) -> usize {
        self.delays.lock().len()
    }

    fn record(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome {
        if cancel.is_cancelled() {
            return SleepOutcome::Cancelled;
        }

        let mut delays = self.delays.lock();
        delays.push(delay);
        if self.cancel_on == Some(delays.len()) {
            drop(delays);
            cancel.cancel();
            return SleepOutcome::Cancelled;
        }
        SleepOutcome::Elapsed
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome {
        self.record(delay, cancel)
    }
}

#[async_trait]
impl AsyncSleeper for RecordingSleeper {
    async fn sleep_async(&self, delay: Duration, cancel: &CancelToken) -> SleepOutcome {
        self.record(delay, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_sleeper_elapses() {
        let token = CancelToken::new();
        let outcome = ThreadSleeper.sleep(Duration::from_millis(5), &token);
        assert_eq!(outcome, SleepOutcome::Elapsed);
    }

    #[test]
    fn test_thread_sleeper_observes_prior_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let outcome = ThreadSleeper.sleep(Duration::from_secs(60), &token);
        assert_eq!(outcome, SleepOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_tokio_sleeper_interrupted() {
        let token = CancelToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                token.cancel();
            })
        };

        let outcome = TokioSleeper
            .sleep_async(Duration::from_secs(60), &token)
            .await;
        assert_eq!(outcome, SleepOutcome::Cancelled);
        canceller.await.unwrap();
    }

    #[test]
    fn test_recording_sleeper_cancels_on_nth() {
        let token = CancelToken::new();
        let sleeper = RecordingSleeper::new().cancel_on_sleep(2);

        assert_eq!(
            Sleeper::sleep(&sleeper, Duration::from_millis(1), &token),
            SleepOutcome::Elapsed
        );
        assert_eq!(
            Sleeper::sleep(&sleeper, Duration::from_millis(2), &token),
            SleepOutcome::Cancelled
        );
        assert!(token.is_cancelled());
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(1), Duration::from_millis(2)]
        );
    }
}
