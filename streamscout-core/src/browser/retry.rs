use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use super::error::BrowserResult;

const TELEMETRY_MAX_ATTEMPTS: usize = 3;
const TELEMETRY_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Fixed-budget retry around telemetry snapshot retrieval.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub result: T,
    pub attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::telemetry()
    }
}

impl RetryPolicy {
    pub fn telemetry() -> Self {
        Self {
            max_attempts: TELEMETRY_MAX_ATTEMPTS,
            delay: TELEMETRY_RETRY_DELAY,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn run<F, Fut, T>(
        &self,
        label: &str,
        mut operation: F,
    ) -> BrowserResult<RetryOutcome<T>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = BrowserResult<T>>,
    {
        let mut attempt = 0usize;
        loop {
            match operation(attempt).await {
                Ok(result) => {
                    return Ok(RetryOutcome {
                        result,
                        attempts: attempt + 1,
                    });
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            operation = label,
                            attempts = attempt,
                            error = %error,
                            "retry budget exhausted"
                        );
                        return Err(error);
                    }
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %error,
                        "operation failed, retrying"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}
