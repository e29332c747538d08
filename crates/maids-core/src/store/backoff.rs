use core::fmt::Display;
use core::future::Future;
use core::time::Duration;

/// Fibonacci backoff for establishing the store connection at startup.
///
/// This is the only retry performed against infrastructure failures, and it
/// runs once at process start. Per-operation failures are never retried by
/// the store or the allocator.
///
/// Delays follow `initial, initial, 2*initial, 3*initial, 5*initial, ...`,
/// each capped at `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FibonacciBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            max_attempts: 30,
        }
    }
}

impl FibonacciBackoff {
    /// Delays to wait after each failed attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.max_delay;
        let mut current = self.initial_delay.min(max);
        let mut next = self.initial_delay;
        (1..self.max_attempts).map(move |_| {
            let delay = current;
            let sum = current.saturating_add(next);
            current = next.min(max);
            next = sum;
            delay
        })
    }

    /// Runs `connect` until it succeeds or the attempts are exhausted, in
    /// which case the last error is returned.
    pub async fn retry<T, E, F, Fut>(&self, what: &str, mut connect: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut delays = self.delays();
        let mut attempt = 1_u32;

        loop {
            match connect().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("Connected to {what} after {attempt} attempts");
                    }
                    return Ok(value);
                }
                Err(err) => match delays.next() {
                    Some(delay) => {
                        tracing::error!(
                            "Attempt {attempt} - Failed to connect to {what}: {err}. Retrying in {} ms",
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        tracing::error!("Failed to establish connection with {what}: {err}");
                        return Err(err);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[test]
    fn delays_grow_as_fibonacci_and_cap() {
        let backoff = FibonacciBackoff {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(3000),
            max_attempts: 8,
        };
        assert_eq!(
            backoff.delays().collect::<Vec<_>>(),
            ms(&[500, 500, 1000, 1500, 2500, 3000, 3000])
        );
    }

    #[test]
    fn single_attempt_has_no_delays() {
        let backoff = FibonacciBackoff {
            max_attempts: 1,
            ..FibonacciBackoff::default()
        };
        assert_eq!(backoff.delays().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = FibonacciBackoff::default()
            .retry("store", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(format!("attempt {n} refused"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_with_last_error() {
        let calls = Cell::new(0);
        let backoff = FibonacciBackoff {
            max_attempts: 4,
            ..FibonacciBackoff::default()
        };
        let result: Result<(), String> = backoff
            .retry("store", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("attempt {n} refused")) }
            })
            .await;
        assert_eq!(result, Err("attempt 4 refused".to_owned()));
        assert_eq!(calls.get(), 4);
    }
}
