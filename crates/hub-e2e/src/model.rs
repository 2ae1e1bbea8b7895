// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON models of the hub's REST resources.
//!
//! Only the fields the checks read are typed; unknown keys are ignored, and the
//! spawner-specific `state` blob keeps everything it does not name.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::error;

/// Name of a user's default server.
pub const DEFAULT_SERVER: &str = "";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub admin: bool,
    /// Requested servers keyed by server name. The presence of a key, not a
    /// flag, is what says a server was requested.
    #[serde(default, deserialize_with = "deserialize_servers")]
    pub servers: HashMap<String, Server>,
}

impl User {
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&Server> {
        self.servers.get(name)
    }

    #[must_use]
    pub fn has_server(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    /// Pending action (`"spawn"`, `"stop"`), or `None` when nothing is in flight.
    #[serde(default, deserialize_with = "deserialize_pending")]
    pub pending: Option<String>,
    /// Routable path of the server, e.g. `/user/alice/`.
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_state")]
    pub state: ServerState,
}

impl Server {
    /// A server is pending while it exists but is not ready.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some() || !self.ready
    }

    #[must_use]
    pub fn pod_name(&self) -> Option<&str> {
        self.state.pod_name.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ServerState {
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HubVersion {
    #[serde(default)]
    pub version: Option<String>,
}

/// Body of `GET /info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HubInfo {
    #[serde(default)]
    pub version: Option<String>,
    pub spawner: ComponentInfo,
    #[serde(default)]
    pub authenticator: Option<ComponentInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentInfo {
    pub class: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// The hub serializes "no servers" as `null` for some user kinds.
fn deserialize_servers<'de, D>(deserializer: D) -> Result<HashMap<String, Server>, D::Error>
where
    D: Deserializer<'de>,
{
    let servers: Option<HashMap<String, Server>> = Option::deserialize(deserializer)?;
    Ok(servers.unwrap_or_default())
}

/// Spawners usually store a dict, but an empty state may come back as `null`.
fn deserialize_state<'de, D>(deserializer: D) -> Result<ServerState, D::Error>
where
    D: Deserializer<'de>,
{
    let state: Option<ServerState> = Option::deserialize(deserializer)?;
    Ok(state.unwrap_or_default())
}

fn deserialize_pending<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Bool(true) => Ok(Some("pending".to_string())),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => {
            error!("Failed to parse pending field, got: {}, ignoring", other);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_user_with_pending_default_server() {
        let user: User = serde_json::from_value(json!({
            "name": "testuser-1",
            "admin": false,
            "servers": {
                "": {
                    "name": "",
                    "ready": false,
                    "pending": "spawn",
                    "url": "/user/testuser-1/",
                    "state": {"pod_name": "jupyter-testuser-1", "namespace": "jh-ci"}
                }
            }
        }))
        .unwrap();

        let server = user.server(DEFAULT_SERVER).unwrap();
        assert!(user.has_server(DEFAULT_SERVER));
        assert!(server.is_pending());
        assert_eq!(server.pending.as_deref(), Some("spawn"));
        assert_eq!(server.pod_name(), Some("jupyter-testuser-1"));
        assert_eq!(server.state.extra.get("namespace"), Some(&json!("jh-ci")));
    }

    #[test]
    fn tolerates_null_servers_and_state() {
        let user: User = serde_json::from_value(json!({
            "name": "bob",
            "servers": null
        }))
        .unwrap();
        assert!(user.servers.is_empty());

        let server: Server = serde_json::from_value(json!({
            "ready": true,
            "pending": null,
            "url": "/user/bob/",
            "state": null
        }))
        .unwrap();
        assert!(!server.is_pending());
        assert_eq!(server.pod_name(), None);
    }

    #[test]
    fn pending_accepts_booleans() {
        let server: Server = serde_json::from_value(json!({"ready": false, "pending": true})).unwrap();
        assert_eq!(server.pending.as_deref(), Some("pending"));

        let server: Server = serde_json::from_value(json!({"ready": true, "pending": false})).unwrap();
        assert_eq!(server.pending, None);
    }

    #[test]
    fn parses_info() {
        let info: HubInfo = serde_json::from_value(json!({
            "version": "1.1.0",
            "python": "3.6.8",
            "spawner": {"class": "kubespawner.spawner.KubeSpawner", "version": "0.11.1"},
            "authenticator": {"class": "dummyauthenticator.DummyAuthenticator", "version": "unknown"}
        }))
        .unwrap();
        assert_eq!(info.spawner.class, "kubespawner.spawner.KubeSpawner");
        assert_eq!(
            info.authenticator.map(|a| a.class).as_deref(),
            Some("dummyauthenticator.DummyAuthenticator")
        );
    }
}
