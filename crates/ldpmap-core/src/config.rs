use std::path::Path;
use std::time::Duration;

use ldpmap_types::ResourceUri;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Where the repository lives and how to talk to it.
///
/// Missing keys in a TOML file fall back to the defaults, which point at a
/// local development server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub host: String,
    pub base_path: String,
    pub request_timeout_secs: u64,
    pub search: SearchConfig,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8983".into(),
            base_path: "/fedora/rest/test".into(),
            request_timeout_secs: 30,
            search: SearchConfig::default(),
        }
    }
}

impl RepositoryConfig {
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        toml::from_str(s).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// `host` joined with `base_path`; every object lives below it.
    pub fn base_uri(&self) -> CoreResult<ResourceUri> {
        Ok(ResourceUri::from_parts(&self.host, &self.base_path)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings consumed by the search index collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub query_handler: String,
    pub create_time_field: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query_handler: "standard".into(),
            create_time_field: "system_create_dtsi".into(),
        }
    }
}

impl SearchConfig {
    /// Oldest objects first.
    pub fn default_sort_params(&self) -> Vec<String> {
        vec![format!("{} asc", self.create_time_field)]
    }
}
