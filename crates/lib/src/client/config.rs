//! Client configuration.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::RequestError;
use crate::{Result, resolver::LoadPaths};

/// Settings shared by every request of one [`Client`](super::Client).
///
/// Every field has a default, so a configuration file only needs to list
/// what it changes:
///
/// ```
/// # use docmesh::ClientConfig;
/// let config: ClientConfig = serde_json::from_str(r#"{"parent_field": "owner"}"#).unwrap();
/// assert_eq!(config.id_field, "id");
/// assert_eq!(config.parent_field.as_deref(), Some("owner"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Field every document's own id is read from and stamped into.
    pub id_field: String,
    /// Reference field linking sub-collection records to their parent.
    /// Always followed during resolution.
    pub parent_field: Option<String>,
    /// Load paths of requests that do not set their own.
    pub default_load_paths: LoadPaths,
    /// Deadline applied to sessions created by the client.
    pub task_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            parent_field: None,
            default_load_paths: LoadPaths::none(),
            task_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_parent_field(mut self, parent_field: impl Into<String>) -> Self {
        self.parent_field = Some(parent_field.into());
        self
    }

    pub fn with_default_load_paths(mut self, paths: LoadPaths) -> Self {
        self.default_load_paths = paths;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Reads a JSON configuration file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&json)?;
        if config.id_field.trim().is_empty() {
            return Err(RequestError::InvalidConfig {
                reason: format!("{}: id_field must not be empty", path.display()),
            }
            .into());
        }
        info!(path = %path.display(), "loaded client configuration");
        Ok(config)
    }
}
