//! resolver configuration
//!
//! Loaded from a yaml or json file by the cli, or built in code. All fields have defaults, so an empty file is a
//! valid configuration.
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub endpoints: EndpointConfig,
    pub network: NetworkConfig,
    /// Sites of one document resolved concurrently. `1` resolves strictly one after another.
    pub max_parallel_fetches: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoints: Default::default(),
            network: Default::default(),
            max_parallel_fetches: 1,
        }
    }
}

/// Base urls of the remote content apis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub github: String,
    pub azure: String,
    pub gitlab: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            github: "https://raw.githubusercontent.com".into(),
            azure: "https://dev.azure.com".into(),
            gitlab: "https://gitlab.com".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl ResolverConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!(path=%path.display(), "loading configuration");
        let contents = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .map(|extension| extension == "json")
            .unwrap_or(false);

        let config = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str::<Option<Self>>(&contents)?.unwrap_or_default()
        };

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse yaml configuration")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Unable to parse json configuration")]
    JsonParseFailed(#[from] serde_json::Error),
}
