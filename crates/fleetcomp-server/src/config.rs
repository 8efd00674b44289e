//! Server configuration.
//!
//! Loaded with figment from, in increasing precedence:
//! 1. Built-in defaults
//! 2. A TOML file (`fleetcomp.toml`, or the path in `FLEETCOMP_CONFIG`)
//! 3. Environment variables prefixed with `FLEETCOMP_`, using `__` to
//!    separate nested keys (`FLEETCOMP_SERVER__PORT=9000`)

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use fleetcomp_caf::CafConfig;
use fleetcomp_db::DbConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "FLEETCOMP_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "fleetcomp.toml";
const ENV_PREFIX: &str = "FLEETCOMP_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {message}")]
    Validation { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub identity: IdentityConfig,
    pub caf: CafConfig,
    pub logging: LoggingConfig,
    /// Identity to enrol as master staff at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted JSON body size in bytes.
    pub json_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            json_limit: 2 * 1024 * 1024,
        }
    }
}

/// Bearer token verification against the external identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Ed25519 public key in PEM format.
    pub public_key_pem: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            issuer: "fleetcomp-identity".into(),
            public_key_pem: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fleetcomp=info".into(),
            json: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Identity-provider subject of the platform administrator.
    pub subject: String,
    pub name: String,
    pub email: String,
}

impl Config {
    /// Load from the file named by `FLEETCOMP_CONFIG`, falling back to
    /// `fleetcomp.toml` in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(path)
    }

    /// Load using `path` as the TOML layer. A missing file is not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.public_key_pem.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "identity.public_key_pem must be set".into(),
            });
        }
        if self.identity.issuer.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "identity.issuer must be set".into(),
            });
        }
        if self.caf.number_retry_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "caf.number_retry_attempts must be greater than 0".into(),
            });
        }
        if self.server.json_limit == 0 {
            return Err(ConfigError::Validation {
                message: "server.json_limit must be greater than 0".into(),
            });
        }
        if let Some(bootstrap) = &self.bootstrap {
            if bootstrap.subject.trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: "bootstrap.subject must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}
