// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for hub interactions.
//!
//! Errors are split along one axis that matters to every wait loop: whether
//! waiting longer could change the outcome. [`HubError::is_transient`] encodes
//! that split so the poller can swallow backend hiccups (a restarting hub, a
//! proxy answering 503) while still aborting on conditions that cannot heal.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// Transport-level issue (DNS, TLS, connection refused, request timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The hub or the proxy in front of it reported a server-side failure.
    #[error("transient backend error: status {0}")]
    Retryable(u16),
    /// The resource does not exist (yet).
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Credentials were rejected.
    #[error("unauthorized: status {0} - check the API token")]
    Unauthorized(u16),
    /// Any other 4xx response.
    #[error("client error: status {0}")]
    Client(u16),
    /// The body was not the JSON document we expected.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The server key never showed up in the user's server map, so the spawn
    /// was never registered or failed outright.
    #[error("server '{server}' for user '{user}' never started")]
    SpawnNeverStarted { user: String, server: String },
    /// An acceptance status outside the documented contract.
    #[error("{operation} returned status {status}, expected one of {expected:?}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        expected: Vec<u16>,
    },
    /// The probe command could not be launched.
    #[error("failed to run probe command: {0}")]
    Probe(#[from] std::io::Error),
    #[error("failed to read version descriptor: {0}")]
    Version(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HubError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HubError::Transport(_)
                | HubError::Retryable(_)
                | HubError::NotFound(_)
                | HubError::Client(_)
                | HubError::Decode(_)
        )
    }

    /// 503 is what the proxy answers while the hub pod is down or restarting.
    #[must_use]
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, HubError::Retryable(503))
    }
}

/// Asserts that an acceptance status is one the protocol allows.
pub fn expect_status(operation: &str, status: StatusCode, expected: &[u16]) -> Result<(), HubError> {
    if expected.contains(&status.as_u16()) {
        return Ok(());
    }
    Err(HubError::UnexpectedStatus {
        operation: operation.to_string(),
        status: status.as_u16(),
        expected: expected.to_vec(),
    })
}

/// Failure of a whole scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Hub(#[from] HubError),
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
}

/// Returns a [`ScenarioError::Assertion`] when the condition does not hold.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::ScenarioError::Assertion(format!($($arg)+)));
        }
    };
}
