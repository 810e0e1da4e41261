use std::future::Future;
use std::time::Duration;

use clinicflow_auth::Profile;
use clinicflow_infra::AppConfig;

/// Fixed-delay retry for profile resolution.
///
/// A freshly registered identity can reach the session before its profile
/// row is visible, so a miss is retried a bounded number of times.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.profile_retry_attempts, config.profile_retry_delay)
    }

    /// Run `attempt` until it yields a value or the attempts run out.
    ///
    /// Sleeps `delay` between attempts, never after the last one.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for n in 1..=self.attempts {
            if let Some(value) = attempt(n).await {
                return Some(value);
            }
            if n < self.attempts {
                tokio::time::sleep(self.delay).await;
            }
        }
        None
    }
}

/// Outcome of resolving a profile under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Profile),
    Exhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run(|n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { (n == 3).then_some(n) }
            })
            .await;

        assert_eq!(result, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts_only() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        let start = tokio::time::Instant::now();

        let result: Option<()> = policy.run(|_| async { None }).await;

        assert_eq!(result, None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(2500));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
