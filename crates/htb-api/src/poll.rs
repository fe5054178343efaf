use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_POLL_TIMEOUT;
use crate::error::{HtbError, Result};
use crate::models::ActiveMachine;
use crate::traits::StatusSource;

/// Fixed delay between status checks. Request latency is not subtracted.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Counters describing one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub elapsed: Duration,
    pub attempts: u32,
    /// Attempts whose status request failed; these never abort the wait.
    pub failed_attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready {
        machine: ActiveMachine,
        report: PollReport,
    },
    TimedOut {
        id: u64,
        report: PollReport,
    },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn report(&self) -> PollReport {
        match self {
            PollOutcome::Ready { report, .. } | PollOutcome::TimedOut { report, .. } => *report,
        }
    }

    /// Treat a timeout as [`HtbError::PollTimeout`].
    pub fn into_result(self) -> Result<(ActiveMachine, PollReport)> {
        match self {
            PollOutcome::Ready { machine, report } => Ok((machine, report)),
            PollOutcome::TimedOut { id, report } => Err(HtbError::PollTimeout {
                id,
                elapsed_secs: report.elapsed.as_secs(),
                attempts: report.attempts,
            }),
        }
    }
}

/// Bounded fixed-interval polling until a spawned machine is reachable.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_wait: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl Poller {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            ..Self::default()
        }
    }

    /// Poll `source` until `id` is not spawning and has an IP, or `max_wait` elapses.
    ///
    /// The deadline is checked before every attempt, so with instant responses a
    /// 300s wait makes 60 attempts. Dropping the returned future stops polling
    /// without side effects.
    pub async fn wait_until_ready<S: StatusSource>(&self, source: &S, id: u64) -> PollOutcome {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut failed_attempts = 0u32;

        loop {
            if start.elapsed() >= self.max_wait {
                let report = PollReport {
                    elapsed: start.elapsed(),
                    attempts,
                    failed_attempts,
                };
                warn!(id, attempts, elapsed_secs = report.elapsed.as_secs(), "machine not ready before deadline");
                return PollOutcome::TimedOut { id, report };
            }

            attempts += 1;
            match source.fetch_status(id).await {
                Ok(Some(machine)) if machine.is_ready() => {
                    let report = PollReport {
                        elapsed: start.elapsed(),
                        attempts,
                        failed_attempts,
                    };
                    info!(id, ip = ?machine.ip, attempts, "machine ready");
                    return PollOutcome::Ready { machine, report };
                }
                Ok(Some(machine)) => {
                    debug!(id, attempt = attempts, spawning = machine.is_spawning, ip = ?machine.ip, "machine not ready yet");
                }
                Ok(None) => {
                    debug!(id, attempt = attempts, "machine not active yet");
                }
                Err(e) => {
                    failed_attempts += 1;
                    warn!(id, attempt = attempts, error = %e, "status check failed; still waiting");
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
