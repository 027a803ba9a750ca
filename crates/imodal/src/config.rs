//! Client configuration.
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `IMODAL_BASE_URL` | `base_url` |
//! | `IMODAL_ASSET_VERSION` | `asset_version` |
//! | `IMODAL_ARRAY_FORMAT` | `array_format` |
//! | `IMODAL_TIMEOUT_MS` | `timeout_ms` |
//!
//! ```toml
//! base_url = "https://app.test"
//! asset_version = "9f2c1e"
//! array_format = "indices"
//! timeout_ms = 10000
//!
//! [extra_headers]
//! X-Tenant = "acme"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::protocol::Headers;
use crate::query::ArrayFormat;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("base_url `{url}` is not an absolute url: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("environment variable {var} has invalid value `{value}`")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin used to resolve relative navigation targets.
    pub base_url: Option<String>,
    /// Asset version sent as `X-Inertia-Version` on visits.
    pub asset_version: Option<String>,
    /// Array spelling used when a GET payload is folded into the query.
    pub array_format: ArrayFormat,
    pub timeout_ms: u64,
    /// Sent with every visit, below the protocol headers.
    pub extra_headers: Headers,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            asset_version: None,
            array_format: ArrayFormat::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            extra_headers: Headers::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded client config");
        Self::from_toml_str(&raw)
    }

    /// Apply `IMODAL_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply `IMODAL_*` overrides from `lookup`.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(base_url) = lookup("IMODAL_BASE_URL") {
            self.base_url = Some(base_url);
        }
        if let Some(version) = lookup("IMODAL_ASSET_VERSION") {
            self.asset_version = Some(version);
        }
        if let Some(format) = lookup("IMODAL_ARRAY_FORMAT") {
            self.array_format = format.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "IMODAL_ARRAY_FORMAT",
                value: format.clone(),
            })?;
        }
        if let Some(timeout) = lookup("IMODAL_TIMEOUT_MS") {
            self.timeout_ms = timeout.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "IMODAL_TIMEOUT_MS",
                value: timeout.clone(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(raw) = &self.base_url {
            Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
                url: raw.clone(),
                source,
            })?;
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.array_format, ArrayFormat::Brackets);
    }

    #[test]
    fn toml_fields_parse() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "https://app.test"
            asset_version = "v7"
            array_format = "indices"
            timeout_ms = 500

            [extra_headers]
            X-Tenant = "acme"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://app.test"));
        assert_eq!(config.asset_version.as_deref(), Some("v7"));
        assert_eq!(config.array_format, ArrayFormat::Indices);
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.extra_headers.get("X-Tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let err = ClientConfig::from_toml_str(r#"base_url = "/app""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ClientConfig::from_toml_str("timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("IMODAL_ASSET_VERSION", "from-env"),
            ("IMODAL_ARRAY_FORMAT", "indices"),
            ("IMODAL_TIMEOUT_MS", "1200"),
        ]);
        let config = ClientConfig::default()
            .with_overrides_from(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.asset_version.as_deref(), Some("from-env"));
        assert_eq!(config.array_format, ArrayFormat::Indices);
        assert_eq!(config.timeout_ms, 1200);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let err = ClientConfig::default()
            .with_overrides_from(|var| (var == "IMODAL_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "IMODAL_TIMEOUT_MS", .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "asset_version = \"disk\"").unwrap();
        let config = ClientConfig::from_path(file.path()).unwrap();
        assert_eq!(config.asset_version.as_deref(), Some("disk"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
