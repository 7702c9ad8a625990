//! Bounded connection retry with a fixed delay.
//!
//! Connecting moves through explicit states:
//!
//! ```text
//! Connecting ──ok──────────────────────────────> Connected
//!     │  └──retryable, retries left──> Retrying ──delay──> Connecting
//!     └──retryable & exhausted, or not retryable──> Failed
//! ```
//!
//! Delays come from `backon`'s constant backoff, so the worst-case wait is
//! `max_retries × delay`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder};
use tracing::{error, info, warn};

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(4000);

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = no retries, just the initial attempt).
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Constant backoff yielding exactly `max_retries` delays.
    pub fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries as usize)
    }

    /// Upper bound on time spent waiting between attempts.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.max_retries
    }
}

/// Where a connector is in its connect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    /// Making attempt number `attempt` (1-based).
    Connecting { attempt: u32 },
    /// Attempt `attempt` was refused; waiting `delay` before the next one.
    Retrying { attempt: u32, delay: Duration },
    /// Connected after `attempts` attempts.
    Connected { attempts: u32 },
    /// Gave up after `attempts` attempts.
    Failed { attempts: u32 },
}

/// Terminal connect failure.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError<E> {
    /// Every attempt was refused.
    #[error("Failed to connect after {retries} retries and {} ms: {source}", .waited.as_millis())]
    Exhausted {
        attempts: u32,
        retries: u32,
        waited: Duration,
        source: E,
    },

    /// The error was not retryable; no further attempts were made.
    #[error("Failed to connect: {0}")]
    Fatal(E),
}

impl<E> ConnectError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } => source,
            Self::Fatal(source) => source,
        }
    }
}

/// Drives connection attempts according to a `RetryPolicy`.
///
/// The attempt counter starts over on every call to `connect`.
#[derive(Debug)]
pub struct Connector {
    policy: RetryPolicy,
    state: ConnectState,
}

impl Connector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: ConnectState::Connecting { attempt: 1 },
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectState {
        self.state
    }

    /// Attempt `connect` until it succeeds, fails fatally, or retries run out.
    ///
    /// `is_retryable` classifies errors; only retryable errors consume the
    /// retry budget, anything else fails immediately.
    pub async fn connect<T, E, F, Fut, R>(
        &mut self,
        endpoint: &str,
        mut connect: F,
        is_retryable: R,
    ) -> Result<T, ConnectError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let mut delays = self.policy.backoff().build();
        let mut waited = Duration::ZERO;
        let mut attempt = 1;

        loop {
            self.state = ConnectState::Connecting { attempt };
            info!(endpoint = %endpoint, attempt, "Connecting");

            let e = match connect().await {
                Ok(connection) => {
                    info!(endpoint = %endpoint, attempts = attempt, "Connected");
                    self.state = ConnectState::Connected { attempts: attempt };
                    return Ok(connection);
                }
                Err(e) => e,
            };

            if !is_retryable(&e) {
                error!(endpoint = %endpoint, error = %e, "Error connecting");
                self.state = ConnectState::Failed { attempts: attempt };
                return Err(ConnectError::Fatal(e));
            }

            let Some(delay) = delays.next() else {
                error!(
                    endpoint = %endpoint,
                    error = %e,
                    "Failed to connect after {} retries and {} ms. Giving up.",
                    self.policy.max_retries,
                    waited.as_millis()
                );
                self.state = ConnectState::Failed { attempts: attempt };
                return Err(ConnectError::Exhausted {
                    attempts: attempt,
                    retries: self.policy.max_retries,
                    waited,
                    source: e,
                });
            };

            warn!(
                endpoint = %endpoint,
                error = %e,
                "Error connecting. Retry {}/{}...",
                attempt,
                self.policy.max_retries
            );
            self.state = ConnectState::Retrying { attempt, delay };
            tokio::time::sleep(delay).await;
            waited += delay;
            attempt += 1;
        }
    }
}

/// One-shot convenience over `Connector::connect`.
pub async fn connect_with_retry<T, E, F, Fut, R>(
    endpoint: &str,
    policy: RetryPolicy,
    connect: F,
    is_retryable: R,
) -> Result<T, ConnectError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    Connector::new(policy)
        .connect(endpoint, connect, is_retryable)
        .await
}

/// True if an I/O error means nothing is listening at the target yet.
pub fn is_connection_refused(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::ConnectionRefused
}

#[cfg(test)]
mod tests;
