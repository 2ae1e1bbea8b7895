// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Harness configuration.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!
//! 1. **Defaults** - suitable for a local kind/minikube deployment of the chart
//! 2. **YAML file** - `hub-e2e.yaml` in the config directory
//! 3. **Environment variables** - `HUB_E2E_*` (highest priority)
//!
//! ```yaml
//! hub_url: http://127.0.0.1:30080/hub/api
//! token: 0cc05feaefeeb29179e924ffc6d9886f
//! test_timeout: 300
//! namespace: jh-ci
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, error};

use crate::client::HubClientOptions;
use crate::error::HubError;
use crate::log_level::LogLevel;
use crate::poll::PollPolicy;

pub const CONFIG_FILE_NAME: &str = "hub-e2e.yaml";
pub const ENV_PREFIX: &str = "HUB_E2E_";
/// Upper bound accepted for any configured timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Hub REST API base, including the `/hub/api` suffix.
    pub hub_url: String,
    pub token: String,
    /// Upper bound for every lifecycle wait.
    pub test_timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Namespace the single-user pods run in.
    pub namespace: String,
    /// Spawner class `GET /info` must report.
    pub spawner_class: String,
    /// Chart descriptor whose `appVersion` the hub must report.
    pub chart_path: PathBuf,
    /// Must be reachable from a user pod under the network policy.
    pub allowed_url: String,
    /// Must be blocked from a user pod under the network policy.
    pub blocked_url: String,
    pub probe_timeout: Duration,
    pub user_prefix: String,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_url: "http://127.0.0.1:30080/hub/api".to_string(),
            token: String::new(),
            test_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            namespace: "jh-ci".to_string(),
            spawner_class: "kubespawner.spawner.KubeSpawner".to_string(),
            chart_path: PathBuf::from("jupyterhub/Chart.yaml"),
            allowed_url: "http://jupyter.org".to_string(),
            blocked_url: "http://mybinder.org".to_string(),
            probe_timeout: Duration::from_secs(5),
            user_prefix: "testuser-".to_string(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Policy for lifecycle waits.
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.test_timeout).with_interval(self.poll_interval)
    }

    #[must_use]
    pub fn client_options(&self) -> HubClientOptions {
        HubClientOptions {
            request_timeout: self.request_timeout,
        }
    }

    pub fn validate(&self) -> Result<(), HubError> {
        if !(self.hub_url.starts_with("http://") || self.hub_url.starts_with("https://")) {
            return Err(HubError::Config(format!(
                "hub_url must start with http:// or https://, got '{}'",
                self.hub_url
            )));
        }
        if self.token.trim().is_empty() {
            return Err(HubError::Config(format!(
                "no API token configured, set {ENV_PREFIX}TOKEN or `token` in {CONFIG_FILE_NAME}"
            )));
        }
        if self.user_prefix.is_empty() {
            return Err(HubError::Config("user_prefix must not be empty".to_string()));
        }
        for (key, value) in [
            ("test_timeout", self.test_timeout),
            ("request_timeout", self.request_timeout),
            ("probe_timeout", self.probe_timeout),
        ] {
            if value > MAX_TIMEOUT {
                return Err(HubError::Config(format!(
                    "{key} of {}s exceeds the maximum of {}s",
                    value.as_secs(),
                    MAX_TIMEOUT.as_secs()
                )));
            }
        }
        Ok(())
    }
}

/// Fields a source may set; anything left `None` keeps its previous value.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub hub_url: Option<String>,
    #[serde(deserialize_with = "deserialize_string_or_int")]
    pub token: Option<String>,
    pub test_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub namespace: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub spawner_class: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub chart_path: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub allowed_url: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub blocked_url: Option<String>,
    pub probe_timeout: Option<u64>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub user_prefix: Option<String>,
    pub log_level: Option<LogLevel>,
}

fn merge(config: &mut Config, partial: PartialConfig) {
    if let Some(v) = partial.hub_url {
        config.hub_url = v;
    }
    if let Some(v) = partial.token {
        config.token = v;
    }
    if let Some(v) = partial.test_timeout {
        config.test_timeout = Duration::from_secs(v);
    }
    if let Some(v) = partial.request_timeout.filter(|v| *v > 0) {
        config.request_timeout = Duration::from_secs(v);
    }
    if let Some(v) = partial.poll_interval_ms.filter(|v| *v > 0) {
        config.poll_interval = Duration::from_millis(v);
    }
    if let Some(v) = partial.namespace {
        config.namespace = v;
    }
    if let Some(v) = partial.spawner_class {
        config.spawner_class = v;
    }
    if let Some(v) = partial.chart_path {
        config.chart_path = PathBuf::from(v);
    }
    if let Some(v) = partial.allowed_url {
        config.allowed_url = v;
    }
    if let Some(v) = partial.blocked_url {
        config.blocked_url = v;
    }
    if let Some(v) = partial.probe_timeout {
        config.probe_timeout = Duration::from_secs(v);
    }
    if let Some(v) = partial.user_prefix {
        config.user_prefix = v;
    }
    if let Some(v) = partial.log_level {
        config.log_level = v;
    }
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    ParseError(String),
}

pub trait ConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct YamlConfigSource {
    pub path: PathBuf,
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Yaml::file(self.path.clone()));
        let partial = figment.extract::<PartialConfig>().map_err(|e| {
            ConfigError::ParseError(format!(
                "Failed to parse config from yaml file {}: {e}",
                self.path.display()
            ))
        })?;
        merge(config, partial);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Env::prefixed(ENV_PREFIX));
        let partial = figment.extract::<PartialConfig>().map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse config from environment: {e}"))
        })?;
        merge(config, partial);
        Ok(())
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config: Config,
}

impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Applies every source in order. A source that fails to parse is logged
    /// and skipped; the others still apply.
    pub fn build(self) -> Config {
        let mut config = self.config;
        for source in &self.sources {
            if let Err(e) = source.load(&mut config) {
                error!("Failed to load config: {:?}", e);
            }
        }
        config.hub_url = config.hub_url.trim().trim_end_matches('/').to_string();
        debug!(hub_url = %config.hub_url, namespace = %config.namespace, "configuration loaded");
        config
    }
}

/// Loads configuration from `<config_directory>/hub-e2e.yaml` and the environment.
#[must_use]
pub fn get_config(config_directory: &Path) -> Config {
    let path = config_directory.join(CONFIG_FILE_NAME);
    ConfigBuilder::default()
        .add_source(Box::new(YamlConfigSource { path }))
        .add_source(Box::new(EnvConfigSource))
        .build()
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => {
            error!(
                "Failed to parse value, expected a string, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}

/// Tokens are hex strings, which the environment provider may hand over as numbers.
pub fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => {
            error!("Failed to parse value, expected a string or an integer, ignoring");
            Ok(None)
        }
    }
}
