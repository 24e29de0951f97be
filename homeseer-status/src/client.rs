//! HTTP client for the hub's `getstatus` endpoint.

use std::fmt;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::device::StatusReport;
use crate::error::{CredentialsError, FetchError, Result};

/// Path and query of the status endpoint.
pub const STATUS_PATH: &str = "/JSON?request=getstatus";

/// HTTP basic credentials presented to the hub.
///
/// Always carries a non-empty username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> std::result::Result<Self, CredentialsError> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() {
            return Err(CredentialsError::MissingUsername);
        }
        if password.is_empty() {
            return Err(CredentialsError::MissingPassword { username });
        }
        Ok(Self { username, password })
    }

    /// Like [`new`](Self::new), but an empty username means anonymous access.
    pub fn optional(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> std::result::Result<Option<Self>, CredentialsError> {
        let username = username.into();
        if username.is_empty() {
            return Ok(None);
        }
        Self::new(username, password).map(Some)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"elided")
            .finish()
    }
}

/// Fetches device snapshots from one hub.
///
/// Requests have no timeout of their own; an unresponsive hub blocks the
/// caller for as long as the transport does.
#[derive(Debug, Clone)]
pub struct StatusClient {
    client: Client,
    host_port: String,
    credentials: Option<Credentials>,
}

impl StatusClient {
    /// Create a client for the hub at `host_port` (for example `"127.0.0.1:8080"`).
    pub fn new(host_port: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self::with_client(Client::new(), host_port, credentials)
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(
        client: Client,
        host_port: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            client,
            host_port: host_port.into(),
            credentials,
        }
    }

    /// The hub's `host:port`.
    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// Username presented to the hub, if any.
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    /// Full URL of the status endpoint.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.host_port, STATUS_PATH)
    }

    /// Retrieve and validate one snapshot.
    pub async fn fetch(&self) -> Result<StatusReport> {
        let url = self.url();

        let mut request = self.client.get(&url);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::StatusCode {
                url,
                code: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let report = StatusReport::from_json(&body)?;

        debug!(url = %url, devices = report.devices.len(), "Fetched status snapshot");

        Ok(report)
    }
}
