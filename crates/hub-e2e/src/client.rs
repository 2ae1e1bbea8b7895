// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the hub's REST API.
//!
//! Read endpoints classify non-success statuses into [`HubError`] variants so
//! wait loops can decide what is worth retrying. Endpoints that start
//! asynchronous work (create, spawn, delete) return the raw status instead:
//! the acceptance code is itself what the checks assert on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HubError;
use crate::model::{HubInfo, HubVersion, User, DEFAULT_SERVER};

/// Path segment separating the public proxy base from the hub API.
const HUB_API_PREFIX: &str = "/hub/api";

/// Operations the checks need from the hub.
///
/// [`HubClient`] is the production implementation; tests substitute
/// in-memory hubs.
#[async_trait]
pub trait HubApi: Send + Sync {
    /// `GET /`
    async fn version(&self) -> Result<HubVersion, HubError>;
    /// `GET /info`
    async fn info(&self) -> Result<HubInfo, HubError>;
    /// `GET /users`
    async fn list_users(&self) -> Result<Vec<User>, HubError>;
    /// `GET /users/{name}`
    async fn get_user(&self, name: &str) -> Result<User, HubError>;
    /// `POST /users/{name}`, returns the acceptance status.
    async fn create_user(&self, name: &str) -> Result<StatusCode, HubError>;
    /// `DELETE /users/{name}`, returns the acceptance status.
    async fn delete_user(&self, name: &str) -> Result<StatusCode, HubError>;
    /// `POST /users/{name}/server[/{server}]`, returns the acceptance status.
    async fn spawn_server(&self, user: &str, server: &str) -> Result<StatusCode, HubError>;
    /// `DELETE /users/{name}/server[/{server}]`, returns the acceptance status.
    async fn delete_server(&self, user: &str, server: &str) -> Result<StatusCode, HubError>;
    /// `GET /proxy` answered with a success status. The body is not inspected.
    async fn proxy_alive(&self) -> Result<(), HubError>;
    /// `GET <public base><server_url>api` on a running server, unauthenticated.
    async fn server_api(&self, server_url: &str) -> Result<Value, HubError>;
}

#[derive(Debug, Clone, Copy)]
pub struct HubClientOptions {
    /// Timeout applied to every individual request.
    pub request_timeout: Duration,
}

impl Default for HubClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    /// Hub API base, e.g. `http://127.0.0.1:30080/hub/api`, without a trailing slash.
    base_url: String,
    headers: HeaderMap,
}

impl HubClient {
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        options: HubClientOptions,
    ) -> Result<Self, HubError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|e| HubError::Config(format!("invalid hub url '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HubError::Config(format!(
                "hub url must use http or https, got '{base_url}'"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("hub-e2e/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|e| HubError::Config(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| HubError::Config("token contains invalid characters".to_string()))?,
        );

        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(HubError::Transport)?;

        Ok(Self {
            client,
            base_url,
            headers,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL of the public proxy: everything before `/hub/api`.
    pub fn public_url(&self) -> &str {
        match self.base_url.find(HUB_API_PREFIX) {
            Some(idx) => &self.base_url[..idx],
            None => &self.base_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HubError> {
        let response = self.send_request(Method::GET, path).await?;
        classify_status(response.status(), path)?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a request without classifying the status.
    async fn send_request(&self, method: Method, path: &str) -> Result<Response, HubError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(
            method = %method,
            url = %url,
            headers = ?redact_headers(&self.headers),
            "hub API request"
        );

        let response = self
            .client
            .request(method.clone(), url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;

        tracing::debug!(
            method = %method,
            url = %url,
            status = %response.status(),
            "hub API response"
        );
        Ok(response)
    }
}

#[async_trait]
impl HubApi for HubClient {
    async fn version(&self) -> Result<HubVersion, HubError> {
        self.get_json("/").await
    }

    async fn info(&self) -> Result<HubInfo, HubError> {
        self.get_json("/info").await
    }

    async fn list_users(&self) -> Result<Vec<User>, HubError> {
        self.get_json("/users").await
    }

    async fn get_user(&self, name: &str) -> Result<User, HubError> {
        self.get_json(&user_path(name)).await
    }

    async fn create_user(&self, name: &str) -> Result<StatusCode, HubError> {
        let response = self.send_request(Method::POST, &user_path(name)).await?;
        Ok(response.status())
    }

    async fn delete_user(&self, name: &str) -> Result<StatusCode, HubError> {
        let response = self.send_request(Method::DELETE, &user_path(name)).await?;
        Ok(response.status())
    }

    async fn spawn_server(&self, user: &str, server: &str) -> Result<StatusCode, HubError> {
        let response = self
            .send_request(Method::POST, &server_path(user, server))
            .await?;
        Ok(response.status())
    }

    async fn delete_server(&self, user: &str, server: &str) -> Result<StatusCode, HubError> {
        let response = self
            .send_request(Method::DELETE, &server_path(user, server))
            .await?;
        Ok(response.status())
    }

    async fn proxy_alive(&self) -> Result<(), HubError> {
        let response = self.send_request(Method::GET, "/proxy").await?;
        classify_status(response.status(), "/proxy")
    }

    async fn server_api(&self, server_url: &str) -> Result<Value, HubError> {
        let url = format!("{}{}api", self.public_url(), server_url);
        tracing::debug!(url = %url, "single-user server API request");
        let response = self.client.get(url.clone()).send().await?;
        classify_status(response.status(), &url)?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Names are percent-encoded so each one stays a single path segment.
fn user_path(name: &str) -> String {
    format!("/users/{}", urlencoding::encode(name))
}

fn server_path(user: &str, server: &str) -> String {
    if server == DEFAULT_SERVER {
        format!("{}/server", user_path(user))
    } else {
        format!("{}/server/{}", user_path(user), urlencoding::encode(server))
    }
}

/// Maps a response status onto the error taxonomy.
fn classify_status(status: StatusCode, resource: &str) -> Result<(), HubError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(HubError::Unauthorized(status.as_u16()));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(HubError::NotFound(resource.to_string()));
    }
    if status.is_server_error() {
        return Err(HubError::Retryable(status.as_u16()));
    }
    // Redirects usually mean the proxy bounced us to a login page.
    Err(HubError::Client(status.as_u16()))
}

/// Returns a redacted view of request headers suitable for debug logging.
fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.as_str().to_ascii_lowercase();
            let display = if lower == "authorization" {
                "<redacted>".to_string()
            } else {
                value
                    .to_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| "<non-utf8>".to_string())
            };
            (lower, display)
        })
        .collect()
}
