//! Read-modify-write loop that retries on version conflicts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{AttemptResult, PolicyError, RetryError};
use crate::policy::RetryPolicy;
use crate::sleeper::{AsyncSleeper, SleepOutcome, Sleeper, ThreadSleeper};
use crate::store::{AsyncVersionedStore, VersionedStore};

/// Executes read-modify-write cycles against a versioned store.
///
/// Each attempt calls `get`, applies `mutate` to the fetched value and
/// submits the result with `update`. An `update` failure classified as a
/// version conflict triggers a backoff sleep and a fresh attempt; any other
/// failure ends the loop at once.
///
/// The retrier holds no per-call state and can be shared between threads
/// and tasks. The store's version check is the only serialization point.
#[derive(Debug, Clone)]
pub struct ConflictRetrier<S = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl ConflictRetrier {
    /// Create a new retrier that sleeps on the calling thread.
    pub fn new(policy: RetryPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            policy,
            sleeper: ThreadSleeper,
        })
    }
}

impl<S> ConflictRetrier<S> {
    /// Replace the sleeper.
    pub fn with_sleeper<T>(self, sleeper: T) -> ConflictRetrier<T> {
        ConflictRetrier {
            policy: self.policy,
            sleeper,
        }
    }

    /// Get the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get the sleeper.
    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Delay to wait after a conflict on `attempt`, or `None` once the
    /// attempt or time budget is spent.
    fn backoff_after(&self, attempt: u32, slept: Duration) -> Option<Duration> {
        if attempt >= self.policy.max_attempts {
            return None;
        }

        let delay = self.policy.jittered_delay(attempt, &mut rand::thread_rng());
        match self.policy.max_elapsed {
            Some(limit) if slept.saturating_add(delay) > limit => None,
            _ => Some(delay),
        }
    }
}

impl<S: Sleeper> ConflictRetrier<S> {
    /// Run the retry loop without a cancellation signal.
    pub fn execute<T, E, G, M, U, C>(
        &self,
        get: G,
        mutate: M,
        update: U,
        is_conflict: C,
    ) -> Result<T, RetryError<E>>
    where
        G: FnMut() -> Result<T, E>,
        M: Fn(T) -> T,
        U: FnMut(T) -> Result<T, E>,
        C: Fn(&E) -> bool,
    {
        self.execute_with_cancel(get, mutate, update, is_conflict, &CancelToken::new())
    }

    /// Run the retry loop, aborting as soon as `cancel` fires.
    ///
    /// Cancellation is checked before every attempt and observed during
    /// backoff sleeps; an in-flight `get` or `update` is never interrupted.
    pub fn execute_with_cancel<T, E, G, M, U, C>(
        &self,
        mut get: G,
        mutate: M,
        mut update: U,
        is_conflict: C,
        cancel: &CancelToken,
    ) -> Result<T, RetryError<E>>
    where
        G: FnMut() -> Result<T, E>,
        M: Fn(T) -> T,
        U: FnMut(T) -> Result<T, E>,
        C: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut slept = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let current = get().map_err(|source| RetryError::Fatal { attempt, source })?;
            let conflict = match AttemptResult::classify(update(mutate(current)), &is_conflict) {
                AttemptResult::Success(updated) => {
                    debug!(attempt, "update applied");
                    return Ok(updated);
                }
                AttemptResult::Fatal(source) => {
                    return Err(RetryError::Fatal { attempt, source });
                }
                AttemptResult::Conflict(err) => err,
            };

            let Some(delay) = self.backoff_after(attempt, slept) else {
                warn!(attempts = attempt, "giving up after repeated version conflicts");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: conflict,
                });
            };

            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "version conflict, backing off"
            );
            if self.sleeper.sleep(delay, cancel) == SleepOutcome::Cancelled {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            slept += delay;
        }
    }

    /// Retry a mutation of one resource held by `store`.
    pub fn update_in<St, M>(
        &self,
        store: &St,
        key: &St::Key,
        mutate: M,
    ) -> Result<St::Resource, RetryError<St::Error>>
    where
        St: VersionedStore,
        M: Fn(St::Resource) -> St::Resource,
    {
        self.update_in_with_cancel(store, key, mutate, &CancelToken::new())
    }

    /// Retry a mutation of one resource held by `store`, aborting on `cancel`.
    pub fn update_in_with_cancel<St, M>(
        &self,
        store: &St,
        key: &St::Key,
        mutate: M,
        cancel: &CancelToken,
    ) -> Result<St::Resource, RetryError<St::Error>>
    where
        St: VersionedStore,
        M: Fn(St::Resource) -> St::Resource,
    {
        self.execute_with_cancel(
            || store.get(key),
            mutate,
            |candidate| store.update(candidate),
            St::is_conflict,
            cancel,
        )
    }
}

impl<S: AsyncSleeper> ConflictRetrier<S> {
    /// Async version of [`ConflictRetrier::execute_with_cancel`].
    pub async fn execute_async<T, E, G, GF, M, U, UF, C>(
        &self,
        mut get: G,
        mutate: M,
        mut update: U,
        is_conflict: C,
        cancel: &CancelToken,
    ) -> Result<T, RetryError<E>>
    where
        G: FnMut() -> GF,
        GF: Future<Output = Result<T, E>>,
        M: Fn(T) -> T,
        U: FnMut(T) -> UF,
        UF: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut slept = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let current = get()
                .await
                .map_err(|source| RetryError::Fatal { attempt, source })?;
            let result = update(mutate(current)).await;
            let conflict = match AttemptResult::classify(result, &is_conflict) {
                AttemptResult::Success(updated) => {
                    debug!(attempt, "update applied");
                    return Ok(updated);
                }
                AttemptResult::Fatal(source) => {
                    return Err(RetryError::Fatal { attempt, source });
                }
                AttemptResult::Conflict(err) => err,
            };

            let Some(delay) = self.backoff_after(attempt, slept) else {
                warn!(attempts = attempt, "giving up after repeated version conflicts");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: conflict,
                });
            };

            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "version conflict, backing off"
            );
            if self.sleeper.sleep_async(delay, cancel).await == SleepOutcome::Cancelled {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            slept += delay;
        }
    }

    /// Async version of [`ConflictRetrier::update_in_with_cancel`].
    pub async fn update_in_async<St, M>(
        &self,
        store: &St,
        key: &St::Key,
        mutate: M,
        cancel: &CancelToken,
    ) -> Result<St::Resource, RetryError<St::Error>>
    where
        St: AsyncVersionedStore,
        M: Fn(St::Resource) -> St::Resource,
    {
        self.execute_async(
            || store.get(key),
            mutate,
            |candidate| store.update(candidate),
            St::is_conflict,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::{RecordingSleeper, TokioSleeper};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum StoreError {
        Conflict,
        Unavailable,
    }

    fn is_conflict(err: &StoreError) -> bool {
        *err == StoreError::Conflict
    }

    fn retrier(policy: RetryPolicy) -> (ConflictRetrier<RecordingSleeper>, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let retrier = ConflictRetrier::new(policy)
            .unwrap()
            .with_sleeper(sleeper.clone());
        (retrier, sleeper)
    }

    fn flat(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_backoff(Duration::from_millis(10))
            .with_jitter(0.0)
    }

    /// Scripted `update` outcomes plus call counters.
    struct Script {
        gets: Cell<u32>,
        mutates: Cell<u32>,
        updates: Cell<u32>,
        outcomes: RefCell<VecDeque<Result<u64, StoreError>>>,
    }

    impl Script {
        fn new(outcomes: Vec<Result<u64, StoreError>>) -> Self {
            Self {
                gets: Cell::new(0),
                mutates: Cell::new(0),
                updates: Cell::new(0),
                outcomes: RefCell::new(outcomes.into()),
            }
        }

        fn run(
            &self,
            retrier: &ConflictRetrier<RecordingSleeper>,
            cancel: &CancelToken,
        ) -> Result<u64, RetryError<StoreError>> {
            retrier.execute_with_cancel(
                || {
                    self.gets.set(self.gets.get() + 1);
                    Ok(0)
                },
                |value| {
                    self.mutates.set(self.mutates.get() + 1);
                    value + 1
                },
                |_candidate| {
                    self.updates.set(self.updates.get() + 1);
                    self.outcomes
                        .borrow_mut()
                        .pop_front()
                        .unwrap_or(Err(StoreError::Conflict))
                },
                is_conflict,
                cancel,
            )
        }
    }

    #[test]
    fn test_rejects_invalid_policy() {
        assert_eq!(
            ConflictRetrier::new(RetryPolicy::new(0)).unwrap_err(),
            PolicyError::ZeroAttempts
        );
    }

    #[test]
    fn test_first_attempt_success() {
        let (retrier, sleeper) = retrier(flat(5));
        let script = Script::new(vec![Ok(42)]);

        let result = script.run(&retrier, &CancelToken::new());

        assert_eq!(result.unwrap(), 42);
        assert_eq!(script.gets.get(), 1);
        assert_eq!(script.mutates.get(), 1);
        assert_eq!(script.updates.get(), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn test_always_conflicting_exhausts_budget() {
        let (retrier, sleeper) = retrier(flat(4));
        let script = Script::new(vec![]);

        let err = script.run(&retrier, &CancelToken::new()).unwrap_err();

        assert!(matches!(
            err,
            RetryError::Exhausted {
                attempts: 4,
                last: StoreError::Conflict
            }
        ));
        assert_eq!(script.gets.get(), 4);
        assert_eq!(script.mutates.get(), 4);
        assert_eq!(script.updates.get(), 4);
        assert_eq!(sleeper.count(), 3);
    }

    #[test]
    fn test_single_attempt_never_sleeps() {
        let (retrier, sleeper) = retrier(RetryPolicy::none());
        let script = Script::new(vec![]);

        let err = script.run(&retrier, &CancelToken::new()).unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(script.gets.get(), 1);
        assert_eq!(script.updates.get(), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn test_fatal_update_stops_immediately() {
        let (retrier, sleeper) = retrier(flat(5));
        let script = Script::new(vec![
            Err(StoreError::Conflict),
            Err(StoreError::Unavailable),
            Ok(1),
        ]);

        let err = script.run(&retrier, &CancelToken::new()).unwrap_err();

        assert!(matches!(
            err,
            RetryError::Fatal {
                attempt: 2,
                source: StoreError::Unavailable
            }
        ));
        assert_eq!(script.gets.get(), 2);
        assert_eq!(script.updates.get(), 2);
        assert_eq!(sleeper.count(), 1);
    }

    #[test]
    fn test_fatal_get_is_never_retried() {
        let (retrier, sleeper) = retrier(flat(5));
        let updates = Cell::new(0);

        let err = retrier
            .execute(
                || Err::<u64, _>(StoreError::Conflict),
                |value| value,
                |value| {
                    updates.set(updates.get() + 1);
                    Ok(value)
                },
                is_conflict,
            )
            .unwrap_err();

        // A conflict-looking error from `get` is still fatal.
        assert!(matches!(err, RetryError::Fatal { attempt: 1, .. }));
        assert_eq!(updates.get(), 0);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn test_conflicts_then_success_backoff_schedule() {
        let policy = RetryPolicy::new(3)
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(1))
            .with_multiplier(2.0)
            .with_jitter(0.0);
        let (retrier, sleeper) = retrier(policy);
        let script = Script::new(vec![
            Err(StoreError::Conflict),
            Err(StoreError::Conflict),
            Ok(3),
        ]);

        let result = script.run(&retrier, &CancelToken::new());

        assert_eq!(result.unwrap(), 3);
        assert_eq!(script.gets.get(), 3);
        assert_eq!(script.updates.get(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn test_jittered_schedule_within_bounds() {
        let policy = RetryPolicy::new(3)
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(1))
            .with_multiplier(2.0)
            .with_jitter(0.1);
        let (retrier, sleeper) = retrier(policy);
        let script = Script::new(vec![
            Err(StoreError::Conflict),
            Err(StoreError::Conflict),
            Ok(3),
        ]);

        script.run(&retrier, &CancelToken::new()).unwrap();

        let delays = sleeper.delays();
        assert_eq!(delays.len(), 2);
        let within = |delay: Duration, low: u64, high: u64| {
            delay >= Duration::from_millis(low) && delay <= Duration::from_millis(high)
        };
        assert!(within(delays[0], 90, 110), "{:?}", delays[0]);
        assert!(within(delays[1], 180, 220), "{:?}", delays[1]);
    }

    #[test]
    fn test_cancel_during_sleep_stops_remote_calls() {
        let sleeper = RecordingSleeper::new().cancel_on_sleep(1);
        let retrier = ConflictRetrier::new(flat(5))
            .unwrap()
            .with_sleeper(sleeper.clone());
        let script = Script::new(vec![]);
        let cancel = CancelToken::new();

        let err = script.run(&retrier, &cancel).unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
        assert_eq!(script.gets.get(), 1);
        assert_eq!(script.updates.get(), 1);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_cancelled_before_start() {
        let (retrier, _sleeper) = retrier(flat(5));
        let script = Script::new(vec![Ok(1)]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = script.run(&retrier, &cancel).unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 0 }));
        assert_eq!(script.gets.get(), 0);
    }

    #[test]
    fn test_max_elapsed_bounds_total_sleep() {
        let policy = flat(10).with_max_elapsed(Duration::from_millis(25));
        let (retrier, sleeper) = retrier(policy);
        let script = Script::new(vec![]);

        let err = script.run(&retrier, &CancelToken::new()).unwrap_err();

        // Two 10ms sleeps fit in 25ms, a third does not.
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(sleeper.count(), 2);
    }

    #[test]
    fn test_mutate_sees_fresh_state_each_attempt() {
        let (retrier, _sleeper) = retrier(flat(5));
        let version = Cell::new(0u64);
        let submitted = RefCell::new(Vec::new());

        let result = retrier.execute(
            || {
                version.set(version.get() + 1);
                Ok::<_, StoreError>(version.get() * 10)
            },
            |value| value + 1,
            |candidate| {
                submitted.borrow_mut().push(candidate);
                if candidate < 30 {
                    Err(StoreError::Conflict)
                } else {
                    Ok(candidate)
                }
            },
            is_conflict,
        );

        assert_eq!(result.unwrap(), 31);
        assert_eq!(*submitted.borrow(), vec![11, 21, 31]);
    }

    #[tokio::test]
    async fn test_async_conflicts_then_success() {
        let sleeper = RecordingSleeper::new();
        let retrier = ConflictRetrier::new(flat(5))
            .unwrap()
            .with_sleeper(sleeper.clone());
        let attempts = std::sync::atomic::AtomicU32::new(0);

        let result = retrier
            .execute_async(
                || async { Ok::<u64, StoreError>(7) },
                |value| value * 2,
                |candidate| {
                    let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(StoreError::Conflict)
                        } else {
                            Ok(candidate)
                        }
                    }
                },
                is_conflict,
                &CancelToken::new(),
            )
            .await;

        assert_eq!(result.unwrap(), 14);
        assert_eq!(sleeper.count(), 2);
    }

    #[tokio::test]
    async fn test_async_cancel_interrupts_tokio_sleep() {
        let retrier = ConflictRetrier::new(
            RetryPolicy::new(5)
                .with_initial_backoff(Duration::from_secs(30))
                .with_max_backoff(Duration::from_secs(30))
                .with_jitter(0.0),
        )
        .unwrap()
        .with_sleeper(TokioSleeper);
        let cancel = CancelToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let err = retrier
            .execute_async(
                || async { Ok::<u64, StoreError>(0) },
                |value| value,
                |_| async { Err::<u64, _>(StoreError::Conflict) },
                is_conflict,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
        canceller.await.unwrap();
    }
}
