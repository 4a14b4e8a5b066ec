//! Configuration loading.
//!
//! Configuration is read from a TOML file (default: `relay.toml`). Every
//! section and field is optional.

use crate::error::ConfigError;
use crate::logging::DEFAULT_FILTER;
use crate::protocol::BrowserIdentity;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub registry: RegistryConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Session and pairing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Directory holding `creds.json` (default: `auth`).
    #[serde(default = "default_auth_dir")]
    pub auth_dir: PathBuf,
    /// Identity shown in the phone's linked devices list.
    #[serde(default)]
    pub browser: BrowserIdentity,
    /// Pair with this number instead of asking on stdin.
    pub phone_number: Option<String>,
}

/// Owner registry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// JSON file holding the owner record (default: `owner.json`).
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

/// Liveness endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address (default: 0.0.0.0:10000).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("auth")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("owner.json")
}

fn default_http_bind() -> String {
    "0.0.0.0:10000".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_log_filter() -> String {
    DEFAULT_FILTER.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_dir: default_auth_dir(),
            browser: BrowserIdentity::default(),
            phone_number: None,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind(),
            enabled: default_http_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds invalid values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or `relay.toml` when it exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http_addr()?;
        if let Some(number) = &self.session.phone_number {
            if !number.chars().any(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid {
                    field: "session.phone_number",
                    reason: format!("{number:?} contains no digits"),
                });
            }
        }
        Ok(())
    }

    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http
            .bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                field: "http.bind_address",
                reason: e.to_string(),
            })
    }
}
