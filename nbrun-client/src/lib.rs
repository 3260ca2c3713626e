//! nbrun HTTP Client
//!
//! A type-safe client for the cluster execution REST API: resolve clusters,
//! manage workspace folders, upload notebooks, submit runs, monitor them to
//! completion and cancel them.
//!
//! # Example
//!
//! ```no_run
//! use nbrun_client::{ClusterClient, MonitorSettings, RunMonitor};
//! use nbrun_core::domain::run::RunRequest;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ClusterClient::new("https://example.cloud", "dapi-token"));
//!
//!     let cluster = client.resolve_cluster("build-cluster").await?;
//!     let handle = client
//!         .submit_run(&RunRequest::new(cluster.cluster_id, "/Shared/etl"))
//!         .await?;
//!
//!     let monitor = RunMonitor::new(client.clone(), MonitorSettings::default());
//!     monitor.wait(handle, "/Shared/etl").await?;
//!     Ok(())
//! }
//! ```

mod clusters;
pub mod context;
pub mod error;
pub mod monitor;
mod runs;
mod workspace;

#[cfg(any(test, feature = "test-util"))]
pub mod test_server;

// Re-export commonly used types
pub use context::JobContext;
pub use error::{ClientError, Result};
pub use monitor::{MonitorHandle, MonitorSettings, RunMonitor, RunStatusSource};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Path prefix of every API endpoint
const API_PREFIX: &str = "api/2.0";

/// How the token is presented in the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Basic base64("token:<TOKEN>")`
    #[default]
    Basic,
    /// `Bearer <TOKEN>`
    Bearer,
}

impl AuthScheme {
    fn header_value(self, token: &str) -> String {
        match self {
            AuthScheme::Basic => format!("Basic {}", STANDARD.encode(format!("token:{}", token))),
            AuthScheme::Bearer => format!("Bearer {}", token),
        }
    }
}

/// HTTP client for the cluster execution API
///
/// Cloning is cheap and all clones share one connection pool, so a single
/// client can serve any number of concurrent monitors.
///
/// Endpoints are grouped by resource:
/// - Clusters (list, resolve by name, state, library installs)
/// - Workspace (directories, artifact upload)
/// - Runs (submit, get, cancel, active listing, bulk cancel)
#[derive(Clone)]
pub struct ClusterClient {
    /// Base URL of the service (e.g., "https://example.cloud")
    base_url: String,
    /// Precomputed `Authorization` header value
    auth_header: String,
    /// HTTP client instance
    client: Client,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("base_url", &self.base_url)
            .field("auth_header", &"<redacted>")
            .finish()
    }
}

impl ClusterClient {
    /// Create a new client using basic token authentication
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the service (e.g., "https://example.cloud")
    /// * `token` - The personal access token
    ///
    /// # Example
    /// ```
    /// use nbrun_client::ClusterClient;
    ///
    /// let client = ClusterClient::new("https://example.cloud/", "dapi-token");
    /// assert_eq!(client.base_url(), "https://example.cloud");
    /// ```
    pub fn new(base_url: impl Into<String>, token: &str) -> Self {
        Self::with_client(base_url, token, AuthScheme::Basic, Client::new())
    }

    /// Create a new client with a chosen authentication scheme
    pub fn with_auth(base_url: impl Into<String>, token: &str, scheme: AuthScheme) -> Self {
        Self::with_client(base_url, token, scheme, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use nbrun_client::{AuthScheme, ClusterClient};
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = ClusterClient::with_client(
    ///     "https://example.cloud",
    ///     "dapi-token",
    ///     AuthScheme::Bearer,
    ///     http_client,
    /// );
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        token: &str,
        scheme: AuthScheme,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: scheme.header_value(token),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            API_PREFIX,
            path.trim_start_matches('/')
        )
    }

    // =============================================================================
    // Transport
    // =============================================================================

    /// Send an authenticated GET and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[] as &[(&str, &str)]).await
    }

    /// Send an authenticated GET with query parameters
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Send an authenticated POST with a JSON body and decode the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send_post(path, body).await?;
        self.handle_response(response).await
    }

    /// Send an authenticated POST whose response body is not needed
    pub async fn post_empty<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.send_post(path, body).await?;
        self.handle_empty_response(response).await
    }

    async fn send_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(path);
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .json(body)
            .send()
            .await?;

        Ok(response)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Non-success statuses become `ClientError::Transport` carrying the
    /// status and the response body, for GET and POST alike.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            return Err(Self::transport_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is ignored on success
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(Self::transport_error(response).await);
        }

        Ok(())
    }

    async fn transport_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::debug!("API returned {}: {}", status, error_text);
        ClientError::transport(status.as_u16(), error_text)
    }
}
