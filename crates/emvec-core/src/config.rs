//! emvec Configuration Management
//!
//! Handles configuration from environment variables and TOML config files.
//! Values are passed through to the index client as given.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vector index connection
    pub index: IndexConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Overwrite fields from any variable `lookup` returns a value for
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let index = &mut self.index;

        if let Some(key) = lookup("PINECONE_API_KEY") {
            index.api_key = Some(key);
        }
        if let Some(env) = lookup("PINECONE_ENVIRONMENT") {
            index.environment = env;
        }
        if let Some(project) = lookup("PINECONE_PROJECT") {
            index.project_name = project;
        }
        if let Some(name) = lookup("PINECONE_INDEX") {
            index.index = name;
        }
        if let Some(host) = lookup("PINECONE_HOST") {
            index.host = Some(host);
        }
        if let Some(namespace) = lookup("PINECONE_NAMESPACE") {
            index.namespace = Some(namespace);
        }
        if let Some(dimension) = lookup("EMBEDDING_DIMENSION") {
            index.dimension = Some(dimension.parse().map_err(|_| ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".to_string(),
                value: dimension,
            })?);
        }
        if let Some(timeout) = lookup("PINECONE_TIMEOUT_SECS") {
            index.timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PINECONE_TIMEOUT_SECS".to_string(),
                value: timeout,
            })?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

/// Vector index connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// API key sent with every request
    pub api_key: Option<String>,

    /// Environment / region the index lives in
    pub environment: String,

    /// Project the index belongs to
    pub project_name: String,

    /// Index name
    pub index: String,

    /// Explicit index host; overrides the host derived from index/project/environment
    pub host: Option<String>,

    /// Partition all reads and writes go to
    pub namespace: Option<String>,

    /// Vector dimension the index was created with (checked locally when set)
    pub dimension: Option<usize>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl IndexConfig {
    /// Configured namespace, or the default one
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            environment: "us-east1-gcp".to_string(),
            project_name: String::new(),
            index: String::new(),
            host: None,
            namespace: None,
            dimension: None,
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.index.namespace(), "default");
        assert_eq!(config.index.timeout_secs, 30);
        assert!(config.index.api_key.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("PINECONE_API_KEY", "secret"),
                ("PINECONE_INDEX", "docs"),
                ("PINECONE_PROJECT", "abc123"),
                ("PINECONE_NAMESPACE", "ns1"),
                ("EMBEDDING_DIMENSION", "384"),
                ("LOG_JSON", "true"),
            ]))
            .unwrap();

        assert_eq!(config.index.api_key.as_deref(), Some("secret"));
        assert_eq!(config.index.index, "docs");
        assert_eq!(config.index.project_name, "abc123");
        assert_eq!(config.index.namespace(), "ns1");
        assert_eq!(config.index.dimension, Some(384));
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_invalid_dimension() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("EMBEDDING_DIMENSION", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "EMBEDDING_DIMENSION"));
    }

    #[test]
    fn test_parse_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [index]
            api_key = "k"
            index = "notes"
            project_name = "p1"
            environment = "eu-west1-gcp"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.index, "notes");
        assert_eq!(config.index.environment, "eu-west1-gcp");
        assert_eq!(config.index.namespace(), DEFAULT_NAMESPACE);
        assert_eq!(config.index.timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/emvec.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
