//! # Configuration
//!
//! `ArborConfig` is read from an optional TOML file and then overridden by
//! environment variables:
//!
//! - `ARBOR_HOST`, `ARBOR_PORT`: bind address of the HTTP server
//! - `ARBOR_DATABASE`: path of the redb database
//! - `ARBOR_API_KEY`: if set and non-empty, requires Bearer token authentication
//! - `ARBOR_RATE_LIMIT`: requests per second (0 disables rate limiting)
//! - `ARBOR_CORS_ORIGINS`: comma-separated allowed origins, or `*`
//!
//! ```toml
//! [server]
//! port = 9000
//!
//! [storage]
//! backend = "redb"
//! path = "arbor.db"
//!
//! [tree]
//! build_max_depth = 20
//!
//! [[roles]]
//! id = 2
//! name = "editor"
//! permissions = ["menu.view", "menu.update"]
//! nodes = [1, 2, 3]
//! ```

use arbor_core::{ArborError, Role, StorageBackend, TreeConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

// =============================================================================
// SECTIONS
// =============================================================================

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on every route but `/health`.
    pub api_key: Option<String>,
    /// Requests per second; `0` disables the limiter.
    pub rate_limit: u32,
    /// Raw `ARBOR_CORS_ORIGINS`-style value; localhost only when unset.
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The API key, if authentication is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Which `NodeStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Redb,
    Memory,
}

impl BackendKind {
    /// Parse a `--backend` value.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Parse(format!(
                "unknown backend {:?} (expected \"redb\" or \"memory\")",
                value
            ))),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("arbor.db"),
        }
    }
}

impl StorageConfig {
    /// Open the configured backend.
    pub fn open(&self) -> Result<StorageBackend, ArborError> {
        match self.backend {
            BackendKind::Redb => StorageBackend::redb(&self.path),
            BackendKind::Memory => Ok(StorageBackend::default()),
        }
    }
}

// =============================================================================
// ARBOR CONFIG
// =============================================================================

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tree: TreeConfig,
    pub roles: Vec<Role>,
}

impl ArborConfig {
    /// Load from `path` (if any), then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;

        tracing::debug!(
            backend = ?config.storage.backend,
            path = %config.storage.path.display(),
            roles = config.roles.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from `ARBOR_*` variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ARBOR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ARBOR_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::Env {
                var: "ARBOR_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(path) = lookup("ARBOR_DATABASE") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(key) = lookup("ARBOR_API_KEY") {
            self.server.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(limit) = lookup("ARBOR_RATE_LIMIT") {
            self.server.rate_limit = limit.trim().parse().map_err(|_| ConfigError::Env {
                var: "ARBOR_RATE_LIMIT",
                value: limit.clone(),
            })?;
        }
        if let Some(origins) = lookup("ARBOR_CORS_ORIGINS") {
            self.server.cors_origins = Some(origins);
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{NodeId, PermissionKey, RoleId};
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = ArborConfig::default();
        assert_eq!(config.server.addr(), "127.0.0.1:8080");
        assert_eq!(config.server.rate_limit, 100);
        assert_eq!(config.storage.backend, BackendKind::Redb);
        assert_eq!(config.tree.build_max_depth, 20);
        assert_eq!(config.tree.descendant_max_depth, 10);
        assert!(config.roles.is_empty());
    }

    #[test]
    fn toml_sections_and_roles() {
        let text = r#"
            [server]
            port = 9000

            [storage]
            backend = "memory"

            [tree]
            build_max_depth = 5

            [[roles]]
            id = 2
            name = "editor"
            permissions = ["menu.view", "menu.update"]
            nodes = [1, 3]
        "#;
        let config = ArborConfig::from_toml_str(text).expect("parse");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.tree.build_max_depth, 5);
        assert_eq!(config.tree.descendant_max_depth, 10);

        let role = &config.roles[0];
        assert_eq!(role.id, RoleId(2));
        assert!(role.active);
        assert!(role.permissions.contains(&PermissionKey::new("menu.update")));
        assert!(role.nodes.contains(&NodeId(3)));
    }

    #[test]
    fn example_config_parses() {
        let config = ArborConfig::from_toml_str(include_str!("../../../arbor.example.toml"))
            .expect("example config");
        assert_eq!(config, {
            let mut expected = ArborConfig::default();
            expected.roles = config.roles.clone();
            expected
        });
        assert!(config.roles[0].id.is_superuser());
        assert_eq!(config.roles[1].nodes.len(), 3);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = ArborConfig::from_toml_str("[storage]\nbackend = \"sqlite\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        assert!(BackendKind::parse("sqlite").is_err());
        assert_eq!(BackendKind::parse("REDB").ok(), Some(BackendKind::Redb));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ArborConfig::from_toml_str("[server]\nport = 9000\n").expect("parse");
        config
            .apply_env(env(&[
                ("ARBOR_PORT", "7000"),
                ("ARBOR_DATABASE", "/tmp/tree.db"),
                ("ARBOR_API_KEY", "secret"),
                ("ARBOR_RATE_LIMIT", "0"),
            ]))
            .expect("env");

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/tree.db"));
        assert_eq!(config.server.api_key(), Some("secret"));
        assert_eq!(config.server.rate_limit, 0);
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut config = ArborConfig::default();
        config.apply_env(env(&[("ARBOR_API_KEY", "")])).expect("env");
        assert_eq!(config.server.api_key(), None);
    }

    #[test]
    fn malformed_port_is_an_error() {
        let mut config = ArborConfig::default();
        let result = config.apply_env(env(&[("ARBOR_PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::Env { var: "ARBOR_PORT", .. })));
    }
}
