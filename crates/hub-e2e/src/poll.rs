// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded polling of remote state.
//!
//! The hub offers no push notification for server state changes, so every wait
//! re-fetches the resource until a check passes or a deadline computed once at
//! entry expires. Running out of time is a normal outcome
//! ([`PollOutcome::TimedOut`]), not an error.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::HubError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut,
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            PollOutcome::TimedOut => None,
        }
    }
}

/// Result of evaluating one fetched state.
#[derive(Debug, Clone, PartialEq)]
pub enum Check<T> {
    Done(T),
    NotYet,
}

/// Repeatedly runs `fetch` and hands the state to `check` until it reports
/// [`Check::Done`] or `policy.timeout` elapses.
///
/// At least one fetch always happens, so a zero timeout is a single
/// best-effort check without sleeping. A timeout too large to represent as an
/// instant never expires. Transient fetch errors count as
/// "not yet"; terminal ones, and any error returned by `check`, end the wait.
pub async fn poll_until<S, T, F, Fut, C>(
    description: &str,
    mut fetch: F,
    mut check: C,
    policy: PollPolicy,
) -> Result<PollOutcome<T>, HubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, HubError>>,
    C: FnMut(S) -> Result<Check<T>, HubError>,
{
    let start = Instant::now();
    let deadline = start.checked_add(policy.timeout);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match fetch().await {
            Ok(state) => {
                if let Check::Done(value) = check(state)? {
                    debug!(
                        what = description,
                        attempts,
                        elapsed = ?start.elapsed(),
                        "condition satisfied"
                    );
                    return Ok(PollOutcome::Ready(value));
                }
            }
            Err(err) if err.is_transient() => {
                if err.is_service_unavailable() {
                    warn!(
                        what = description,
                        attempts,
                        "proxy answered 503, the hub may have crashed; still waiting"
                    );
                } else {
                    warn!(what = description, attempts, error = %err, "poll attempt failed");
                }
            }
            Err(err) => return Err(err),
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    debug!(
                        what = description,
                        attempts,
                        timeout = ?policy.timeout,
                        "gave up waiting"
                    );
                    return Ok(PollOutcome::TimedOut);
                }
                policy.interval.min(deadline - now)
            }
            None => policy.interval,
        };
        sleep(pause).await;
    }
}
