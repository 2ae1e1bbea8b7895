// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Egress probes run from inside a server's pod.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::HubError;

/// Outcome of a single reachability attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable,
    /// Non-zero exit code, or `None` when the process was killed by a signal.
    Blocked(Option<i32>),
}

impl ProbeStatus {
    #[must_use]
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ProbeStatus::Reachable,
            other => ProbeStatus::Blocked(other),
        }
    }

    #[must_use]
    pub fn is_reachable(self) -> bool {
        self == ProbeStatus::Reachable
    }
}

#[async_trait]
pub trait ExecProbe: Send + Sync {
    /// Tries to fetch `url` once from inside `pod`.
    async fn probe(&self, pod: &str, url: &str) -> Result<ProbeStatus, HubError>;
}

/// Runs `wget` in the pod through `kubectl exec`.
#[derive(Debug, Clone)]
pub struct KubectlProbe {
    pub program: String,
    pub namespace: String,
    /// Connect/read timeout handed to `wget -T`.
    pub timeout: Duration,
}

impl KubectlProbe {
    #[must_use]
    pub fn new(namespace: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: "kubectl".to_string(),
            namespace: namespace.into(),
            timeout,
        }
    }

    fn args(&self, pod: &str, url: &str) -> Vec<String> {
        vec![
            format!("--namespace={}", self.namespace),
            "exec".to_string(),
            pod.to_string(),
            "--".to_string(),
            "wget".to_string(),
            "-q".to_string(),
            "-t1".to_string(),
            format!("-T{}", self.timeout.as_secs().max(1)),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl ExecProbe for KubectlProbe {
    async fn probe(&self, pod: &str, url: &str) -> Result<ProbeStatus, HubError> {
        let args = self.args(pod, url);
        debug!(program = %self.program, ?args, "running egress probe");

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await?;

        let result = ProbeStatus::from_exit_code(status.code());
        debug!(pod, url, ?result, "egress probe finished");
        Ok(result)
    }
}
