//! Configuration for Stratum.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $STRATUM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/stratum/config.toml
//!   3. ~/.config/stratum/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StratumConfig {
    pub object_backend: BackendConfig,
    pub kv_backend: BackendConfig,
    pub servers: Vec<ServerAddr>,
    pub stripe_size: u64,
    pub pool_max_connections: usize,
    pub default_safety: SafetyConfig,
}

/// Names a driver by module name plus the local path it roots itself at,
/// resolved by `stratumd` at process start (§4.8's "extension point").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub module: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyConfig {
    None,
    Network,
    Storage,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for StratumConfig {
    fn default() -> Self {
        Self {
            object_backend: BackendConfig {
                module: "filesystem".to_string(),
                path: data_dir().join("objects"),
            },
            kv_backend: BackendConfig {
                module: "memory".to_string(),
                path: data_dir().join("kv"),
            },
            servers: vec![ServerAddr {
                host: "127.0.0.1".to_string(),
                port: 4711,
            }],
            stripe_size: 1_048_576, // 1 MiB
            pool_max_connections: 8,
            default_safety: SafetyConfig::Network,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            module: "filesystem".to_string(),
            path: data_dir().join("objects"),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("stratum")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("stratum")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl StratumConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            StratumConfig::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("STRATUM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&StratumConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply STRATUM_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("STRATUM_OBJECT_BACKEND__MODULE") {
            self.object_backend.module = v;
        }
        if let Ok(v) = std::env::var("STRATUM_OBJECT_BACKEND__PATH") {
            self.object_backend.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("STRATUM_KV_BACKEND__MODULE") {
            self.kv_backend.module = v;
        }
        if let Ok(v) = std::env::var("STRATUM_KV_BACKEND__PATH") {
            self.kv_backend.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("STRATUM_STRIPE_SIZE") {
            self.stripe_size = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STRATUM_STRIPE_SIZE", v))?;
        }
        if let Ok(v) = std::env::var("STRATUM_POOL_MAX_CONNECTIONS") {
            self.pool_max_connections = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STRATUM_POOL_MAX_CONNECTIONS", v))?;
        }
        if let Ok(v) = std::env::var("STRATUM_DEFAULT_SAFETY") {
            self.default_safety = match v.as_str() {
                "none" => SafetyConfig::None,
                "network" => SafetyConfig::Network,
                "storage" => SafetyConfig::Storage,
                other => {
                    return Err(ConfigError::InvalidValue(
                        "STRATUM_DEFAULT_SAFETY",
                        other.to_string(),
                    ))
                }
            };
        }
        if let Ok(v) = std::env::var("STRATUM_SERVERS") {
            self.servers = v
                .split(',')
                .map(|entry| parse_server_addr(entry))
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(())
    }
}

fn parse_server_addr(entry: &str) -> Result<ServerAddr, ConfigError> {
    let (host, port) = entry
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidValue("STRATUM_SERVERS", entry.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::InvalidValue("STRATUM_SERVERS", entry.to_string()))?;
    Ok(ServerAddr {
        host: host.to_string(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_shape() {
        let config = StratumConfig::default();
        assert_eq!(config.object_backend.module, "filesystem");
        assert_eq!(config.kv_backend.module, "memory");
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.pool_max_connections, 8);
        assert_eq!(config.default_safety, SafetyConfig::Network);
    }

    #[test]
    fn parses_server_list_from_env_format() {
        let addr = parse_server_addr("db-1.internal:4711").unwrap();
        assert_eq!(addr.host, "db-1.internal");
        assert_eq!(addr.port, 4711);
        assert!(parse_server_addr("no-port").is_err());
    }

    #[test]
    fn env_overrides_stripe_size() {
        let mut config = StratumConfig::default();
        config.stripe_size = 4096;
        assert_eq!(config.stripe_size, 4096);
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp =
            std::env::temp_dir().join(format!("stratum-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("STRATUM_CONFIG", config_path.to_str().unwrap());
        }

        let path =
            StratumConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = StratumConfig::load().expect("load should succeed");
        assert_eq!(config.object_backend.module, "filesystem");

        unsafe {
            std::env::remove_var("STRATUM_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
