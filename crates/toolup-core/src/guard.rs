use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio_util::sync::CancellationToken;
use toolup_backend::BackendError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub install: Duration,
    pub operation: Duration,
    pub fetch: Duration,
    /// Delay before each attempt of a read-only lookup. One entry per attempt.
    pub fetch_retry_delays_secs: Vec<u64>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            install: Duration::from_secs(1800),
            operation: Duration::from_secs(120),
            fetch: Duration::from_secs(60),
            fetch_retry_delays_secs: vec![0, 2, 5],
        }
    }
}

/// Bounds every external call with a timeout and the run's cancellation token.
#[derive(Debug, Clone)]
pub struct Guard {
    cancel: CancellationToken,
    timeouts: Timeouts,
}

impl Guard {
    #[must_use]
    pub fn new(cancel: CancellationToken, timeouts: Timeouts) -> Self {
        Self { cancel, timeouts }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    #[must_use]
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub async fn install<T, F>(&self, operation: &'static str, future: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        bounded(&self.cancel, self.timeouts.install, operation, future).await
    }

    pub async fn operation<T, F>(
        &self,
        operation: &'static str,
        future: F,
    ) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        bounded(&self.cancel, self.timeouts.operation, operation, future).await
    }

    /// Run a read-only lookup, retrying network, timeout and command
    /// failures on the configured delay schedule.
    pub async fn fetch<T, Op, Fut>(&self, operation: &'static str, mut op: Op) -> Result<T, BackendError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let delays: &[u64] = if self.timeouts.fetch_retry_delays_secs.is_empty() {
            &[0]
        } else {
            &self.timeouts.fetch_retry_delays_secs
        };
        let mut last_err = None;

        for (attempt, &delay_secs) in delays.iter().enumerate() {
            if delay_secs > 0 {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(BackendError::Cancelled { operation }),
                    () = tokio::time::sleep(Duration::from_secs(delay_secs)) => {}
                }
            }

            match bounded(&self.cancel, self.timeouts.fetch, operation, op()).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() => {
                    debug!("{operation} attempt {} failed: {error}", attempt + 1);
                    last_err = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_err.unwrap_or(BackendError::Cancelled { operation }))
    }
}

async fn bounded<T, F>(
    cancel: &CancellationToken,
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(BackendError::Cancelled { operation }),
        result = tokio::time::timeout(limit, future) => match result {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                operation,
                seconds: limit.as_secs(),
            }),
        },
    }
}
