// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the hub API and the pod probe.
//!
//! Both are cheap to clone and share their state, so a test can hand one copy
//! to the harness and inspect the other afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hub_e2e::client::HubApi;
use hub_e2e::error::HubError;
use hub_e2e::model::{ComponentInfo, HubInfo, HubVersion, Server, ServerState, User};
use hub_e2e::probe::{ExecProbe, ProbeStatus};
use reqwest::StatusCode;
use serde_json::{json, Value};

/// How a spawned server behaves on the fake hub.
#[derive(Debug, Clone, Copy)]
pub enum SpawnBehavior {
    /// Pending for this many user reads, then ready.
    ReadyAfter(u32),
    /// The spawn fails right away and the server entry vanishes.
    NeverRegistered,
    /// Stays pending forever.
    NeverReady,
}

#[derive(Debug, Clone, Copy)]
pub enum DeleteBehavior {
    /// Still listed for this many user reads after the delete, then gone.
    RemovedAfter(u32),
    /// Stuck terminating.
    NeverRemoved,
}

struct ServerSim {
    model: Server,
    polls_until_ready: Option<u32>,
    polls_until_removed: Option<u32>,
}

#[derive(Default)]
struct HubState {
    users: HashMap<String, HashMap<String, ServerSim>>,
    deleted_users: Vec<String>,
    spawn_requests: Vec<(String, String)>,
    delete_requests: Vec<(String, String)>,
    proxy_failures: VecDeque<HubError>,
}

#[derive(Clone)]
pub struct FakeHub {
    state: Arc<Mutex<HubState>>,
    pub version: String,
    pub spawner_class: String,
    pub spawn_behavior: SpawnBehavior,
    pub spawn_status: StatusCode,
    pub delete_behavior: DeleteBehavior,
    pub delete_status: StatusCode,
}

impl Default for FakeHub {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            version: "1.1.0".to_string(),
            spawner_class: "kubespawner.spawner.KubeSpawner".to_string(),
            spawn_behavior: SpawnBehavior::ReadyAfter(2),
            spawn_status: StatusCode::ACCEPTED,
            delete_behavior: DeleteBehavior::RemovedAfter(1),
            delete_status: StatusCode::ACCEPTED,
        }
    }
}

impl FakeHub {
    /// Makes the next `GET /proxy` calls fail with the given errors.
    pub fn fail_proxy_with(&self, errors: Vec<HubError>) {
        self.state.lock().unwrap().proxy_failures = errors.into();
    }

    pub fn live_users(&self) -> Vec<String> {
        self.state.lock().unwrap().users.keys().cloned().collect()
    }

    pub fn deleted_users(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_users.clone()
    }

    pub fn spawn_requests(&self) -> usize {
        self.state.lock().unwrap().spawn_requests.len()
    }

    pub fn delete_requests(&self) -> usize {
        self.state.lock().unwrap().delete_requests.len()
    }

    /// Servers still present across all users.
    pub fn running_servers(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Advances every simulated server by one observation and renders the user.
    fn observe(name: &str, servers: &mut HashMap<String, ServerSim>) -> User {
        servers.retain(|_, sim| !matches!(sim.polls_until_removed, Some(0)));
        for sim in servers.values_mut() {
            if let Some(n) = sim.polls_until_removed.as_mut() {
                *n -= 1;
                continue;
            }
            match sim.polls_until_ready.as_mut() {
                Some(0) => {
                    sim.model.ready = true;
                    sim.model.pending = None;
                    sim.polls_until_ready = None;
                }
                Some(n) => *n -= 1,
                None => {}
            }
        }
        User {
            name: name.to_string(),
            admin: false,
            servers: servers
                .iter()
                .map(|(k, sim)| (k.clone(), sim.model.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl HubApi for FakeHub {
    async fn version(&self) -> Result<HubVersion, HubError> {
        Ok(HubVersion {
            version: Some(self.version.clone()),
        })
    }

    async fn info(&self) -> Result<HubInfo, HubError> {
        Ok(HubInfo {
            version: Some(self.version.clone()),
            spawner: ComponentInfo {
                class: self.spawner_class.clone(),
                version: None,
            },
            authenticator: None,
        })
    }

    async fn list_users(&self) -> Result<Vec<User>, HubError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter_mut()
            .map(|(name, servers)| Self::observe(name, servers))
            .collect())
    }

    async fn get_user(&self, name: &str) -> Result<User, HubError> {
        let mut state = self.state.lock().unwrap();
        match state.users.get_mut(name) {
            Some(servers) => Ok(Self::observe(name, servers)),
            None => Err(HubError::NotFound(format!("/users/{name}"))),
        }
    }

    async fn create_user(&self, name: &str) -> Result<StatusCode, HubError> {
        let mut state = self.state.lock().unwrap();
        if state.users.contains_key(name) {
            return Ok(StatusCode::CONFLICT);
        }
        state.users.insert(name.to_string(), HashMap::new());
        Ok(StatusCode::CREATED)
    }

    async fn delete_user(&self, name: &str) -> Result<StatusCode, HubError> {
        let mut state = self.state.lock().unwrap();
        match state.users.remove(name) {
            Some(_) => {
                state.deleted_users.push(name.to_string());
                Ok(StatusCode::NO_CONTENT)
            }
            None => Ok(StatusCode::NOT_FOUND),
        }
    }

    async fn spawn_server(&self, user: &str, server: &str) -> Result<StatusCode, HubError> {
        let mut state = self.state.lock().unwrap();
        state
            .spawn_requests
            .push((user.to_string(), server.to_string()));
        if !self.spawn_status.is_success() {
            return Ok(self.spawn_status);
        }
        let Some(servers) = state.users.get_mut(user) else {
            return Ok(StatusCode::NOT_FOUND);
        };
        let polls_until_ready = match self.spawn_behavior {
            SpawnBehavior::NeverRegistered => return Ok(self.spawn_status),
            SpawnBehavior::ReadyAfter(n) => Some(n),
            SpawnBehavior::NeverReady => Some(u32::MAX),
        };
        servers.insert(
            server.to_string(),
            ServerSim {
                model: Server {
                    name: server.to_string(),
                    ready: false,
                    pending: Some("spawn".to_string()),
                    url: format!("/user/{user}/"),
                    state: ServerState {
                        pod_name: Some(format!("jupyter-{user}")),
                        extra: Default::default(),
                    },
                },
                polls_until_ready,
                polls_until_removed: None,
            },
        );
        Ok(self.spawn_status)
    }

    async fn delete_server(&self, user: &str, server: &str) -> Result<StatusCode, HubError> {
        let mut state = self.state.lock().unwrap();
        state
            .delete_requests
            .push((user.to_string(), server.to_string()));
        if !self.delete_status.is_success() {
            return Ok(self.delete_status);
        }
        if let Some(sim) = state
            .users
            .get_mut(user)
            .and_then(|servers| servers.get_mut(server))
        {
            sim.model.ready = false;
            sim.model.pending = Some("stop".to_string());
            sim.polls_until_ready = None;
            sim.polls_until_removed = match self.delete_behavior {
                DeleteBehavior::RemovedAfter(n) => Some(n),
                DeleteBehavior::NeverRemoved => Some(u32::MAX),
            };
        }
        Ok(self.delete_status)
    }

    async fn proxy_alive(&self) -> Result<(), HubError> {
        let mut state = self.state.lock().unwrap();
        match state.proxy_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn server_api(&self, server_url: &str) -> Result<Value, HubError> {
        let state = self.state.lock().unwrap();
        let running = state
            .users
            .values()
            .flat_map(HashMap::values)
            .any(|sim| sim.model.ready && sim.model.url == server_url);
        if running {
            Ok(json!({"version": "6.0.0"}))
        } else {
            Err(HubError::Retryable(503))
        }
    }
}

/// Probe answering from a fixed table of URL outcomes.
#[derive(Clone, Default)]
pub struct FakeProbe {
    outcomes: HashMap<String, ProbeStatus>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeProbe {
    pub fn with(entries: &[(&str, ProbeStatus)]) -> Self {
        Self {
            outcomes: entries
                .iter()
                .map(|(url, status)| (url.to_string(), *status))
                .collect(),
            calls: Arc::default(),
        }
    }

    /// `(pod, url)` pairs probed so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecProbe for FakeProbe {
    async fn probe(&self, pod: &str, url: &str) -> Result<ProbeStatus, HubError> {
        self.calls
            .lock()
            .unwrap()
            .push((pod.to_string(), url.to_string()));
        Ok(self
            .outcomes
            .get(url)
            .copied()
            .unwrap_or(ProbeStatus::Blocked(Some(4))))
    }
}
