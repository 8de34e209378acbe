use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bound and spacing for [`retry_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(350))
    }
}

/// Runs `operation` until it succeeds, the error fails `should_retry`, or the policy's attempt
/// budget is spent. The closure receives the 1-based attempt number. The last error is
/// returned unchanged.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(err);
                }

                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Retriable failure, backing off"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum Failure {
        Transient,
        Fatal,
    }

    impl std::fmt::Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn transient(err: &Failure) -> bool {
        *err == Failure::Transient
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_try_without_sleeping() {
        let started = tokio::time::Instant::now();
        let result: Result<u32, Failure> =
            retry_if(RetryPolicy::default(), |_| async { Ok(7) }, transient).await;

        assert_eq!(result, Ok(7));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_if(
            RetryPolicy::default(),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Failure::Transient)
                    } else {
                        Ok(attempt)
                    }
                }
            },
            transient,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_attempt_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<(), Failure> = retry_if(
            RetryPolicy::new(3, Duration::from_millis(350)),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::Transient) }
            },
            transient,
        )
        .await;

        assert_eq!(result, Err(Failure::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_when_predicate_rejects() {
        let calls = AtomicU32::new(0);

        let result: Result<(), Failure> = retry_if(
            RetryPolicy::default(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::Fatal) }
            },
            transient,
        )
        .await;

        assert_eq!(result, Err(Failure::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
