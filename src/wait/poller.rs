//! Condition poller
//!
//! Re-evaluates a predicate until it yields a value or the deadline passes.
//! Errors from the predicate are recorded and polling continues; the last one
//! is attached to the final `WaitTimeout`.

use super::conditions::Condition;
use crate::session::Driver;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Poll interval and deadline for one wait
#[derive(Debug, Clone, PartialEq)]
pub struct Wait {
    timeout: Duration,
    interval: Duration,
    message: Option<String>,
}

impl Default for Wait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::from_millis(100),
            message: None,
        }
    }
}

impl Wait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Text used in the timeout error
    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `predicate` until it returns `Some`
    ///
    /// Every attempt is cut off at the deadline, and no attempt starts after it.
    pub async fn until<T, F, Fut>(&self, mut predicate: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_error: Option<Error> = None;
        let mut attempts: u32 = 0;

        loop {
            let now = Instant::now();
            if attempts > 0 && now >= deadline {
                debug!("Wait expired after {} attempts", attempts);
                return Err(Error::WaitTimeout {
                    timeout: self.timeout,
                    message: self.message.clone().unwrap_or_else(|| "condition".to_string()),
                    last_error: last_error.map(Box::new),
                });
            }

            attempts += 1;
            match tokio::time::timeout(deadline.saturating_duration_since(now), predicate()).await {
                Ok(Ok(Some(value))) => {
                    debug!("Wait satisfied on attempt {}", attempts);
                    return Ok(value);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    debug!("Wait attempt {} failed: {}", attempts, e);
                    last_error = Some(e);
                }
                Err(_) => debug!("Wait attempt {} cut off at the deadline", attempts),
            }

            tokio::time::sleep_until((Instant::now() + self.interval).min(deadline)).await;
        }
    }

    /// Poll an expected condition against the driver
    pub async fn for_condition<C: Condition>(&self, driver: &Driver, condition: C) -> Result<C::Output> {
        let wait = Wait {
            message: Some(self.message.clone().unwrap_or_else(|| condition.description())),
            ..self.clone()
        };

        let condition = &condition;
        wait.until(move || condition.check(driver)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Predicate that is unmet for the first `misses` polls
    fn ready_after(misses: u32) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<Option<&'static str>>>) {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let predicate = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok((n >= misses).then_some("ready")))
        };
        (polls, predicate)
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_after_three_polls() {
        let (polls, predicate) = ready_after(3);
        let wait = Wait::new(Duration::from_secs(2)).with_interval(Duration::from_millis(100));

        let started = Instant::now();
        assert_eq!(wait.until(predicate).await.unwrap(), "ready");
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_when_deadline_is_too_short() {
        let (polls, predicate) = ready_after(3);
        let wait = Wait::new(Duration::from_millis(150)).with_interval(Duration::from_millis(100));

        let started = Instant::now();
        let err = wait.until(predicate).await.unwrap_err();
        assert!(matches!(err, Error::WaitTimeout { timeout, .. } if timeout == Duration::from_millis(150)));
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_keep_polling_and_last_one_is_kept() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let wait = Wait::new(Duration::from_millis(500)).with_message("element div#late");

        let err = wait
            .until(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Err::<Option<()>, _>(Error::not_found(format!("attempt {}", n))) }
            })
            .await
            .unwrap_err();

        match err {
            Error::WaitTimeout { message, last_error, .. } => {
                assert_eq!(message, "element div#late");
                let last = polls.load(Ordering::SeqCst) - 1;
                assert_eq!(last_error.unwrap().to_string(), format!("No element matches selector: attempt {}", last));
            }
            other => panic!("expected wait timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_predicate_is_cut_off_at_deadline() {
        let wait = Wait::new(Duration::from_secs(1));
        let started = Instant::now();

        let err = wait
            .until(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Some(()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::WaitTimeout { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_timeout_still_polls_once() {
        let (polls, predicate) = ready_after(0);
        let wait = Wait::new(Duration::ZERO);

        let value = tokio_test::block_on(wait.until(predicate));
        assert_eq!(tokio_test::assert_ok!(value), "ready");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }
}
