//! Importer configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! identity_tag_key = "crossplane.io/external-name"
//! resources_per_page = 50
//! pass_timeout_secs = 30
//!
//! [tagging]
//! endpoint = "http://localhost:8080"
//! region = "us-east-1"
//! ```

use crate::gateway::{DEFAULT_IDENTITY_TAG_KEY, DEFAULT_RESOURCES_PER_PAGE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest page size the tagging API accepts
pub const MAX_RESOURCES_PER_PAGE: u32 = 100;

/// Importer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImporterConfig {
    /// Tag whose value is adopted as the external name
    pub identity_tag_key: String,
    /// Page size for tag index queries (1..=100)
    pub resources_per_page: u32,
    /// Deadline for one whole pass
    pub pass_timeout_secs: u64,
    /// How long the orchestrator may cache a response
    pub response_ttl_secs: u64,
    /// HTTP tag index client settings
    pub tagging: TaggingConfig,
}

impl ImporterConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and validate a TOML configuration file
    ///
    /// # Errors
    /// [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_tag_key.is_empty() {
            return Err(ConfigError::invalid("identity_tag_key", "must not be empty"));
        }
        if !(1..=MAX_RESOURCES_PER_PAGE).contains(&self.resources_per_page) {
            return Err(ConfigError::invalid(
                "resources_per_page",
                format!("must be between 1 and {MAX_RESOURCES_PER_PAGE}"),
            ));
        }
        if self.pass_timeout_secs == 0 {
            return Err(ConfigError::invalid("pass_timeout_secs", "must be positive"));
        }
        if self.tagging.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "tagging.request_timeout_secs",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// With identity tag key
    #[inline]
    #[must_use]
    pub fn with_identity_tag_key(mut self, key: impl Into<String>) -> Self {
        self.identity_tag_key = key.into();
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_resources_per_page(mut self, n: u32) -> Self {
        self.resources_per_page = n;
        self
    }

    /// With pass deadline
    #[inline]
    #[must_use]
    pub fn with_pass_timeout_secs(mut self, secs: u64) -> Self {
        self.pass_timeout_secs = secs;
        self
    }

    /// With response TTL
    #[inline]
    #[must_use]
    pub fn with_response_ttl_secs(mut self, secs: u64) -> Self {
        self.response_ttl_secs = secs;
        self
    }

    /// With tag index settings
    #[inline]
    #[must_use]
    pub fn with_tagging(mut self, tagging: TaggingConfig) -> Self {
        self.tagging = tagging;
        self
    }

    /// Pass deadline as a duration
    #[inline]
    #[must_use]
    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }

    /// Response TTL as a duration
    #[inline]
    #[must_use]
    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_secs)
    }
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            identity_tag_key: DEFAULT_IDENTITY_TAG_KEY.to_string(),
            resources_per_page: DEFAULT_RESOURCES_PER_PAGE,
            pass_timeout_secs: 30,
            response_ttl_secs: 60,
            tagging: TaggingConfig::default(),
        }
    }
}

/// HTTP tag index client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaggingConfig {
    /// Base URL of the tagging endpoint; derived from `region` when unset
    pub endpoint: Option<String>,
    pub region: String,
    /// Extra headers sent with every request (eg, for a signing proxy)
    pub headers: BTreeMap<String, String>,
    /// Timeout of a single page request
    pub request_timeout_secs: u64,
}

impl TaggingConfig {
    /// With explicit endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// With region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// With an extra request header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Endpoint to send requests to
    #[must_use]
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://tagging.{}.amazonaws.com", self.region))
    }

    /// Single request timeout as a duration
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            headers: BTreeMap::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
