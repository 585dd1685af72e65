use crate::error::{ApiError, Error};
use std::thread;
use std::time::Duration;
use tracing::{trace, warn};

/// Runs remote calls, retrying transient backend errors until a time budget runs out.
///
/// Every remote call in the crate goes through here; nothing above this layer retries.
#[derive(Debug, Clone, Copy)]
pub struct RequestExecutor {
    retry_interval: Duration,
    sleep: fn(Duration),
}

impl RequestExecutor {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            retry_interval,
            sleep: thread::sleep,
        }
    }

    /// Replace the blocking sleep, e.g. with a no-op in tests.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Execute `request`, re-issuing it unchanged after each transient failure.
    ///
    /// Each retry spends one `retry_interval` of `budget`. With budget `B` and interval `I`
    /// at most `B / I + 1` attempts are made before [`Error::Timeout`]. Any other failure is
    /// returned straight away.
    pub fn execute<T, F>(&self, budget: Duration, mut request: F) -> Result<T, Error>
    where
        F: FnMut() -> Result<T, ApiError>,
    {
        let mut remaining = budget;
        let mut attempt = 1u32;
        loop {
            match request() {
                Ok(response) => {
                    trace!(attempt, "Request succeeded");
                    return Ok(response);
                }
                Err(err) if err.is_transient() => {
                    remaining = match remaining.checked_sub(self.retry_interval) {
                        Some(left) => left,
                        None => {
                            warn!(attempt, "Retry budget exhausted: {}", err);
                            return Err(Error::Timeout);
                        }
                    };
                    warn!(
                        attempt,
                        "{}; retrying in {}s",
                        err,
                        self.retry_interval.as_secs_f64()
                    );
                    (self.sleep)(self.retry_interval);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
