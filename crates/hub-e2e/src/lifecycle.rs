// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Waits on a server's lifecycle.
//!
//! Spawning and stopping are both asynchronous on the hub side: the API
//! acknowledges the request and the server entry changes later. Both waits
//! below re-read the user record on every attempt and never trust a cached
//! copy.

use tracing::{debug, info};

use crate::client::HubApi;
use crate::error::{expect_status, HubError};
use crate::model::Server;
use crate::poll::{poll_until, Check, PollOutcome, PollPolicy};

/// Statuses the hub uses to acknowledge a server deletion.
pub const DELETE_ACCEPTED: [u16; 2] = [202, 204];

/// Waits for `user`'s `server` to report `ready`.
///
/// The server key must already be present: a spawn that was never registered,
/// or that failed outright, disappears from the map and can never become ready
/// by waiting, so its absence is reported immediately as
/// [`HubError::SpawnNeverStarted`]. Running out of time is
/// [`PollOutcome::TimedOut`].
pub async fn wait_for_ready(
    api: &dyn HubApi,
    user: &str,
    server: &str,
    policy: PollPolicy,
) -> Result<PollOutcome<Server>, HubError> {
    let description = format!("server '{server}' of '{user}' to become ready");
    let outcome = poll_until(
        &description,
        || api.get_user(user),
        |record| match record.servers.get(server) {
            None => Err(HubError::SpawnNeverStarted {
                user: user.to_string(),
                server: server.to_string(),
            }),
            Some(model) if model.ready => Ok(Check::Done(model.clone())),
            Some(model) => {
                debug!(
                    user,
                    server,
                    pending = model.is_pending(),
                    action = ?model.pending,
                    "server not ready yet"
                );
                Ok(Check::NotYet)
            }
        },
        policy,
    )
    .await?;

    if let PollOutcome::Ready(model) = &outcome {
        info!(user, server, url = %model.url, pod = ?model.pod_name(), "server is ready");
    }
    Ok(outcome)
}

/// Waits for `user`'s `server` to disappear from the user's server map.
///
/// The caller must already have had the deletion acknowledged (see
/// [`delete_server_and_wait`]). A server stuck mid-teardown looks exactly like
/// a slow one, so this always waits until the deadline and reports the result
/// as a plain `bool`.
pub async fn wait_for_removal(
    api: &dyn HubApi,
    user: &str,
    server: &str,
    policy: PollPolicy,
) -> Result<bool, HubError> {
    let description = format!("server '{server}' of '{user}' to be removed");
    let outcome = poll_until(
        &description,
        || api.get_user(user),
        |record| {
            Ok(if record.has_server(server) {
                Check::NotYet
            } else {
                Check::Done(())
            })
        },
        policy,
    )
    .await?;

    let removed = outcome.is_ready();
    if removed {
        info!(user, server, "server removed");
    }
    Ok(removed)
}

/// Requests deletion of a server, checks the acknowledgement and waits for the
/// entry to go away.
pub async fn delete_server_and_wait(
    api: &dyn HubApi,
    user: &str,
    server: &str,
    policy: PollPolicy,
) -> Result<bool, HubError> {
    let status = api.delete_server(user, server).await?;
    expect_status("delete server", status, &DELETE_ACCEPTED)?;
    wait_for_removal(api, user, server, policy).await
}
