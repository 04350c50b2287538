//! Configuration management

use std::{collections::HashMap, env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Catalog store configuration
    pub catalog: CatalogConfig,
    /// Live description sync configuration
    pub sync: SyncConfig,
    /// Target API configuration (used by the HTTP transport)
    pub api: ApiConfig,
}

/// Catalog store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding the chunk files
    pub directory: String,
    /// Chunk file name prefix (`tools_` gives `tools_1.json`, `tools_2.json`, ...)
    pub file_prefix: String,
    /// Number of shard slots (chunk files are numbered `1..=shard_slots`)
    pub shard_slots: u32,
    /// Maximum descriptors per chunk file before it is split
    pub max_entries_per_shard: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            directory: "tools".to_string(),
            file_prefix: "tools_".to_string(),
            shard_slots: 10,
            max_entries_per_shard: 20,
        }
    }
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// URL of the live `OpenAPI`/Swagger JSON document
    pub swagger_url: String,
    /// Fetch timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Append descriptors for live operations missing from the catalog
    pub add_missing: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            swagger_url: String::new(),
            timeout: Duration::from_secs(30),
            add_missing: false,
        }
    }
}

/// Target API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL prepended to every resolved path
    pub base_url: String,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Bearer credential reference: `env:VAR_NAME` or a literal token
    pub auth_token: Option<String>,
    /// Extra headers sent with every call
    pub headers: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: Duration::from_secs(30),
            auth_token: None,
            headers: HashMap::new(),
        }
    }
}

impl ApiConfig {
    /// Resolve the bearer token (expand `env:` references)
    #[must_use]
    pub fn resolve_auth_token(&self) -> Option<String> {
        self.auth_token.as_ref().and_then(|token| {
            if let Some(var_name) = token.strip_prefix("env:") {
                env::var(var_name).ok()
            } else if token.is_empty() {
                None
            } else {
                Some(token.clone())
            }
        })
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (API_CATALOG_ prefix)
        figment = figment.merge(Env::prefixed("API_CATALOG_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        // Expand ${VAR} in paths, URLs and headers
        config.expand_env_vars();

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the store and engines cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.catalog.directory.trim().is_empty() {
            return Err(Error::Config("catalog.directory must not be empty".to_string()));
        }
        if self.catalog.shard_slots == 0 {
            return Err(Error::Config("catalog.shard_slots must be at least 1".to_string()));
        }
        if self.catalog.max_entries_per_shard == 0 {
            return Err(Error::Config(
                "catalog.max_entries_per_shard must be at least 1".to_string(),
            ));
        }
        if self.sync.timeout.is_zero() || self.api.request_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in config values
    fn expand_env_vars(&mut self) {
        // Pattern: ${VAR} or ${VAR:-default}
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        self.catalog.directory = Self::expand_string(&re, &self.catalog.directory);
        self.sync.swagger_url = Self::expand_string(&re, &self.sync.swagger_url);
        self.api.base_url = Self::expand_string(&re, &self.api.base_url);
        for value in self.api.headers.values_mut() {
            *value = Self::expand_string(&re, value);
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" must be checked before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            let m = mins.parse::<u64>().map_err(serde::de::Error::custom)?;
            m.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {s}")))
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.catalog.max_entries_per_shard, 20);
        assert_eq!(config.catalog.shard_slots, 10);
        assert!(!config.sync.add_missing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
catalog:
  directory: ./data/tools
  shard_slots: 4
sync:
  swagger_url: https://api.example.com/openapi.json
  timeout: 500ms
api:
  base_url: https://api.example.com/v1
  request_timeout: 2m
  auth_token: env:EXAMPLE_API_TOKEN
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.catalog.directory, "./data/tools");
        assert_eq!(config.catalog.shard_slots, 4);
        assert_eq!(config.catalog.file_prefix, "tools_");
        assert_eq!(config.sync.timeout, Duration::from_millis(500));
        assert_eq!(config.api.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_oversized_minute_timeout_is_rejected() {
        let yaml = "sync:\n  timeout: 307445734561825861m\n";
        let err = serde_yaml::from_str::<Config>(yaml).unwrap_err();
        assert!(err.to_string().contains("duration out of range"));
    }

    #[test]
    fn test_load_from_file_expands_env_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "catalog:\n  directory: \"${{API_CATALOG_TEST_UNSET_DIR:-fallback/tools}}\""
        )
        .unwrap();
        drop(f);

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.catalog.directory, "fallback/tools");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/catalog.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_slots() {
        let mut config = Config::default();
        config.catalog.shard_slots = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_auth_token() {
        let literal = ApiConfig {
            auth_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        assert_eq!(literal.resolve_auth_token().as_deref(), Some("secret-token"));

        let missing = ApiConfig {
            auth_token: Some("env:API_CATALOG_TEST_NO_SUCH_VAR".to_string()),
            ..Default::default()
        };
        assert_eq!(missing.resolve_auth_token(), None);
    }

    #[test]
    fn test_load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        // Should not panic
        config.load_env_files();
    }
}
