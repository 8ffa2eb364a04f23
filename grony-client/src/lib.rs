//! Grony HTTP Client
//!
//! Talks to the control server of a running `grony start`. Every command is a
//! form-encoded `POST /grony/{command}` carrying the registry's bearer secret.
//!
//! # Example
//!
//! ```no_run
//! use grony_client::GronyClient;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GronyClient::new("http://127.0.0.1:62830", "secret");
//!
//!     let response = client.remove("notes").await?;
//!     for message in response.messages {
//!         println!("{:?}: {}", message.severity, message.message);
//!     }
//!     Ok(())
//! }
//! ```

mod commands;
pub mod error;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use grony_core::dto::command::{CommandMessage, CommandResponse, Severity};

use grony_core::registry::ControlConfig;
use reqwest::Client;

/// HTTP client for the grony control server
#[derive(Debug, Clone)]
pub struct GronyClient {
    /// Base URL of the control server (e.g., "http://127.0.0.1:62830")
    base_url: String,
    /// Bearer secret shared through the registry file
    secret: String,
    /// HTTP client instance
    client: Client,
}

impl GronyClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use grony_client::GronyClient;
    ///
    /// let client = GronyClient::new("http://127.0.0.1:62830/", "secret");
    /// assert_eq!(client.base_url(), "http://127.0.0.1:62830");
    /// ```
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        // The server is always on loopback; never route it through a proxy
        let client = Client::builder().no_proxy().build().unwrap_or_default();
        Self::with_client(base_url, secret, client)
    }

    /// Create a new client with a custom HTTP client
    pub fn with_client(
        base_url: impl Into<String>,
        secret: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.into(),
            client,
        }
    }

    /// Create a client for the server described by a registry's `[config]`
    pub fn from_config(config: &ControlConfig) -> Result<Self> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ClientError::InvalidConfig(
                    "registry has no secret; has 'grony start' run yet?".to_string(),
                )
            })?;

        Ok(Self::new(config.base_url(), secret))
    }

    /// Get the base URL of the control server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `command` with form parameters and decode the response body
    pub async fn make_request(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<CommandResponse> {
        let url = format!("{}/grony/{}", self.base_url, command);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret)
            .form(params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the command response
    async fn handle_response(&self, response: reqwest::Response) -> Result<CommandResponse> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
