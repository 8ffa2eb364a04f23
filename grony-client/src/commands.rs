//! Command endpoints

use std::path::Path;

use crate::GronyClient;
use crate::error::Result;
use grony_core::dto::command::CommandResponse;

impl GronyClient {
    // =============================================================================
    // Registry Commands
    // =============================================================================

    /// Create a default `.grony` file in `path`
    ///
    /// `path` should be absolute: the server resolves relative paths against
    /// its own working directory.
    pub async fn init(&self, path: &Path) -> Result<CommandResponse> {
        let path = path.display().to_string();
        self.make_request("init", &[("path", path.as_str())]).await
    }

    /// Register the repository at `path` as `name`
    ///
    /// # Example
    /// ```no_run
    /// # use grony_client::GronyClient;
    /// # use std::path::Path;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = GronyClient::new("http://127.0.0.1:62830", "secret");
    /// let response = client.add(Path::new("/home/me/notes"), "notes").await?;
    /// assert!(response.is_success());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add(&self, path: &Path, name: &str) -> Result<CommandResponse> {
        let path = path.display().to_string();
        self.make_request("add", &[("path", path.as_str()), ("name", name)])
            .await
    }

    /// Unregister the repository `name`
    pub async fn remove(&self, name: &str) -> Result<CommandResponse> {
        self.make_request("remove", &[("name", name)]).await
    }
}
