// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios against a live hub.
//!
//! Every scenario that provisions something does so through a scoped helper
//! ([`Harness::with_user`], [`Harness::with_server`]) which releases the
//! resource on every exit path: success, error, or a panicking assertion. The
//! hub is shared by all scenarios, so a leaked server would skew the ones that
//! follow.

use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::HubApi;
use crate::config::Config;
use crate::ensure;
use crate::error::{expect_status, HubError, ScenarioError};
use crate::lifecycle::{delete_server_and_wait, wait_for_ready};
use crate::model::{Server, DEFAULT_SERVER};
use crate::poll::{poll_until, Check, PollOutcome};
use crate::probe::ExecProbe;

pub const USER_CREATED: [u16; 1] = [201];
pub const SPAWN_ACCEPTED: [u16; 2] = [201, 202];

pub struct Harness {
    pub api: Box<dyn HubApi>,
    pub probe: Box<dyn ExecProbe>,
    pub config: Config,
}

impl Harness {
    #[must_use]
    pub fn new(api: Box<dyn HubApi>, probe: Box<dyn ExecProbe>, config: Config) -> Self {
        Self { api, probe, config }
    }

    fn new_user_name(&self) -> String {
        format!("{}{}", self.config.user_prefix, Uuid::new_v4())
    }

    /// Creates a fresh user, runs `body` with its name, then deletes the user.
    pub async fn with_user<T, F, Fut>(&self, body: F) -> Result<T, ScenarioError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, ScenarioError>>,
    {
        let name = self.new_user_name();
        let status = self.api.create_user(&name).await?;
        expect_status("create user", status, &USER_CREATED)?;
        info!(user = %name, "created test user");

        let outcome = AssertUnwindSafe(body(name.clone())).catch_unwind().await;
        self.remove_user(&name).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => resume_unwind(panic),
        }
    }

    /// Spawns `user`'s `server`, waits until it is ready, runs `body` with the
    /// ready server, then deletes the server and waits for it to be gone.
    ///
    /// The cleanup runs even when the wait or `body` fails. A failing body wins
    /// over a failing cleanup; the latter is only logged in that case.
    pub async fn with_server<T, F, Fut>(
        &self,
        user: &str,
        server: &str,
        body: F,
    ) -> Result<T, ScenarioError>
    where
        F: FnOnce(Server) -> Fut,
        Fut: Future<Output = Result<T, ScenarioError>>,
    {
        let status = self.api.spawn_server(user, server).await?;
        expect_status("spawn server", status, &SPAWN_ACCEPTED)?;
        info!(user, server, status = status.as_u16(), "spawn accepted");

        let outcome = AssertUnwindSafe(self.run_when_ready(user, server, body))
            .catch_unwind()
            .await;
        let cleanup = self.release_server(user, server).await;

        match outcome {
            Ok(Ok(value)) => {
                cleanup?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(cleanup_error) = cleanup {
                    error!(user, server, error = %cleanup_error, "cleanup after failed scenario also failed");
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(cleanup_error) = cleanup {
                    error!(user, server, error = %cleanup_error, "cleanup after panic failed");
                }
                resume_unwind(panic)
            }
        }
    }

    async fn run_when_ready<T, F, Fut>(
        &self,
        user: &str,
        server: &str,
        body: F,
    ) -> Result<T, ScenarioError>
    where
        F: FnOnce(Server) -> Fut,
        Fut: Future<Output = Result<T, ScenarioError>>,
    {
        let policy = self.config.poll_policy();
        match wait_for_ready(self.api.as_ref(), user, server, policy).await? {
            PollOutcome::Ready(model) => body(model).await,
            PollOutcome::TimedOut => Err(ScenarioError::Timeout {
                what: format!("server '{server}' of '{user}' to become ready"),
                timeout: policy.timeout,
            }),
        }
    }

    async fn release_server(&self, user: &str, server: &str) -> Result<(), HubError> {
        let removed =
            delete_server_and_wait(self.api.as_ref(), user, server, self.config.poll_policy())
                .await?;
        if !removed {
            warn!(
                user,
                server,
                timeout = ?self.config.test_timeout,
                "server still present after delete"
            );
        }
        Ok(())
    }

    /// Best effort: failures are logged, never raised.
    async fn remove_user(&self, name: &str) {
        match self.api.delete_user(name).await {
            Ok(status) if status.as_u16() == 204 || status.as_u16() == 404 => {
                info!(user = name, "deleted test user");
            }
            Ok(status) => warn!(user = name, status = status.as_u16(), "unexpected status deleting user"),
            Err(e) => warn!(user = name, error = %e, "failed to delete user"),
        }
    }

    /// `GET /` reports the version the chart ships.
    pub async fn check_version(&self, expected: &str) -> Result<(), ScenarioError> {
        let version = self.api.version().await?;
        let reported = version.version.unwrap_or_else(|| "version-missing".to_string());
        ensure!(
            reported == expected,
            "hub reports version '{reported}', chart expects '{expected}'"
        );
        Ok(())
    }

    /// `GET /info` names the configured spawner class.
    pub async fn check_info(&self) -> Result<(), ScenarioError> {
        let info = self.api.info().await?;
        info!(
            version = ?info.version,
            spawner = %info.spawner.class,
            authenticator = ?info.authenticator.as_ref().map(|a| a.class.as_str()),
            "hub info"
        );
        ensure!(
            info.spawner.class == self.config.spawner_class,
            "spawner class is '{}', expected '{}'",
            info.spawner.class,
            self.config.spawner_class
        );
        Ok(())
    }

    pub async fn check_user_roundtrip(&self) -> Result<(), ScenarioError> {
        self.with_user(|name| async move {
            let user = self.api.get_user(&name).await?;
            ensure!(user.name == name, "got user '{}', expected '{name}'", user.name);
            Ok(())
        })
        .await
    }

    pub async fn check_list_users(&self) -> Result<(), ScenarioError> {
        self.with_user(|name| async move {
            let users = self.api.list_users().await?;
            ensure!(
                users.iter().any(|u| u.name == name),
                "user '{name}' missing from a list of {} users",
                users.len()
            );
            Ok(())
        })
        .await
    }

    /// The hub can reach the proxy's API, retried until the test timeout.
    pub async fn check_proxy_liveness(&self) -> Result<(), ScenarioError> {
        let policy = self.config.poll_policy();
        let outcome = poll_until(
            "proxy to answer",
            || self.api.proxy_alive(),
            |_| Ok(Check::Done(())),
            policy,
        )
        .await?;
        match outcome {
            PollOutcome::Ready(()) => Ok(()),
            PollOutcome::TimedOut => Err(ScenarioError::Timeout {
                what: "GET /proxy to succeed".to_string(),
                timeout: policy.timeout,
            }),
        }
    }

    /// A spawned server is routable through the proxy and answers its own API.
    pub async fn check_server_reachable(&self) -> Result<(), ScenarioError> {
        self.with_user(|user| async move {
            self.with_server(&user, DEFAULT_SERVER, |server| async move {
                ensure!(!server.url.is_empty(), "ready server has no url");
                let body = self.api.server_api(&server.url).await?;
                ensure!(
                    body.get("version").is_some(),
                    "server API at {} has no version: {body}",
                    server.url
                );
                Ok(())
            })
            .await
        })
        .await
    }

    /// Egress from a user pod is allowed to the allow-listed host only.
    pub async fn check_network_policy(&self) -> Result<(), ScenarioError> {
        self.with_user(|user| async move {
            self.with_server(&user, DEFAULT_SERVER, |server| async move {
                let pod = server
                    .pod_name()
                    .ok_or_else(|| ScenarioError::Assertion("ready server has no pod_name".to_string()))?;

                let allowed = self.probe.probe(pod, &self.config.allowed_url).await?;
                ensure!(
                    allowed.is_reachable(),
                    "unable to reach allowed {} from {pod}: {allowed:?}",
                    self.config.allowed_url
                );

                let blocked = self.probe.probe(pod, &self.config.blocked_url).await?;
                ensure!(
                    !blocked.is_reachable(),
                    "blocked {} was reachable from {pod}",
                    self.config.blocked_url
                );
                Ok(())
            })
            .await
        })
        .await
    }

    /// Runs every scenario in order; one failing does not stop the rest.
    pub async fn run_suite(&self, expected_version: &str) -> SuiteReport {
        let mut report = SuiteReport::default();
        report.record("hub_version", self.timed(self.check_version(expected_version)).await);
        report.record("hub_info", self.timed(self.check_info()).await);
        report.record("user_roundtrip", self.timed(self.check_user_roundtrip()).await);
        report.record("list_users", self.timed(self.check_list_users()).await);
        report.record("proxy_liveness", self.timed(self.check_proxy_liveness()).await);
        report.record("server_reachable", self.timed(self.check_server_reachable()).await);
        report.record("network_policy", self.timed(self.check_network_policy()).await);
        report
    }

    async fn timed<F>(&self, scenario: F) -> (Result<(), ScenarioError>, Duration)
    where
        F: Future<Output = Result<(), ScenarioError>>,
    {
        let start = Instant::now();
        let result = scenario.await;
        (result, start.elapsed())
    }
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub elapsed: Duration,
    pub error: Option<ScenarioError>,
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    fn record(&mut self, name: &'static str, (result, elapsed): (Result<(), ScenarioError>, Duration)) {
        match &result {
            Ok(()) => info!(scenario = name, ?elapsed, "PASSED"),
            Err(e) => error!(scenario = name, ?elapsed, error = %e, "FAILED"),
        }
        self.results.push(ScenarioResult {
            name,
            elapsed,
            error: result.err(),
        });
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }
}
