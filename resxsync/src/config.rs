//! Settings read from `resxsync.toml`.
//!
//! Every field is optional in the file; missing fields take the values of
//! [`SyncConfig::default`].
//!
//! ```toml
//! neutral_label = "Neutral"
//! empty_neutral = "skip"
//!
//! [cloud]
//! concurrency = 3
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{culture, error::Error};

pub const CONFIG_FILE_NAME: &str = "resxsync.toml";

/// What key convergence does for files whose neutral file has no entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyNeutralPolicy {
    /// Rewrite the culture files to match (they end up empty) and log it.
    #[default]
    Converge,
    /// Rewrite the culture files without logging.
    Quiet,
    /// Leave the culture files untouched.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// `Generator` value of neutral files when the default generator is requested.
    pub generator_tool: String,
    /// `ItemType` value of resource files when the default content type is requested.
    pub content_type: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            generator_tool: "PublicResXFileCodeGenerator".to_string(),
            content_type: "EmbeddedResource".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Upper bound of concurrent requests.
    pub concurrency: usize,
    /// Cells per write request.
    pub write_batch_size: usize,
    /// Cells per read request.
    pub read_batch_size: usize,
    /// Attempts after the first one for transient failures.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            write_batch_size: 1_000,
            read_batch_size: 5_000,
            max_retries: 3,
            initial_backoff_ms: 500,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Column title of the neutral culture.
    pub neutral_label: String,
    /// Extension of resource files, without the dot.
    pub resource_extension: String,
    /// Name segments never read as a culture.
    pub non_culture_extensions: Vec<String>,
    pub empty_neutral: EmptyNeutralPolicy,
    pub metadata: MetadataConfig,
    pub cloud: CloudConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            neutral_label: culture::DEFAULT_NEUTRAL_LABEL.to_string(),
            resource_extension: "resx".to_string(),
            non_culture_extensions: culture::NON_CULTURE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            empty_neutral: EmptyNeutralPolicy::default(),
            metadata: MetadataConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let config: SyncConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Loads `resxsync.toml` from `directory`, or the defaults when there is none.
    pub fn load_or_default(directory: impl AsRef<Path>) -> Result<Self, Error> {
        let path = directory.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_toml_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    fn validate(&self) -> Result<(), Error> {
        if self.neutral_label.trim().is_empty() {
            return Err(Error::Config("neutral_label must not be empty".to_string()));
        }
        if self.resource_extension.trim().is_empty() || self.resource_extension.starts_with('.')
        {
            return Err(Error::Config(
                "resource_extension must be a bare extension such as `resx`".to_string(),
            ));
        }
        if self.cloud.concurrency == 0 {
            return Err(Error::Config("cloud.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}
