//! Configuration management
//!
//! Built-in defaults, then an optional TOML file, then `RAX_FTP__*`
//! environment overrides (e.g. `RAX_FTP__SERVER__PORT=2121`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineSettings;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Complete application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub client: ClientSettings,
}

/// Hosted listener settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Address the listener binds when `start` omits one.
    pub bind_address: String,
    /// Port the listener binds when `start` omits one; `0` picks a free port.
    pub port: u16,
    /// Account file used by `save`/`load` without a path, and at startup.
    pub accounts_file: String,
    pub data_timeout_secs: u64,
    pub max_command_length: usize,
}

/// Remote session settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub default_port: u16,
    pub local_root: String,
    /// Socket timeout of the blocking client; `0` disables it.
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Loads `config.toml` from the working directory if present.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads from `path` (extension optional); a missing file is not an error.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Self::builder()?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("RAX_FTP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 2121_i64)?
            .set_default("server.accounts_file", "accounts.json")?
            .set_default("server.data_timeout_secs", 30_i64)?
            .set_default("server.max_command_length", 512_i64)?
            .set_default("client.default_port", 21_i64)?
            .set_default("client.local_root", ".")?
            .set_default("client.timeout_secs", 30_i64)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Message(
                "server.bind_address cannot be empty".into(),
            ));
        }

        if self.server.accounts_file.trim().is_empty() {
            return Err(ConfigError::Message(
                "server.accounts_file cannot be empty".into(),
            ));
        }

        if self.server.max_command_length == 0 {
            return Err(ConfigError::Message(
                "server.max_command_length must be greater than 0".into(),
            ));
        }

        if self.client.default_port == 0 {
            return Err(ConfigError::Message(
                "client.default_port cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Engine tunables derived from the server section.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            data_timeout: Duration::from_secs(self.server.data_timeout_secs),
            max_command_length: self.server.max_command_length,
            ..EngineSettings::default()
        }
    }

    pub fn accounts_path(&self) -> PathBuf {
        PathBuf::from(&self.server.accounts_file)
    }

    /// Client socket timeout, `None` when disabled.
    pub fn client_timeout(&self) -> Option<Duration> {
        match self.client.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "0.0.0.0".to_string(),
                port: 2121,
                accounts_file: "accounts.json".to_string(),
                data_timeout_secs: 30,
                max_command_length: 512,
            },
            client: ClientSettings {
                default_port: 21,
                local_root: ".".to_string(),
                timeout_secs: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.client.default_port, 21);
        assert_eq!(config.client_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "[server]\nport = 2200\naccounts_file = \"users.json\"\n\n[client]\ntimeout_secs = 0\n",
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 2200);
        assert_eq!(config.accounts_path(), PathBuf::from("users.json"));
        assert_eq!(config.server.max_command_length, 512);
        assert_eq!(config.client_timeout(), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[client]\ndefault_port = 0\n").unwrap();
        assert!(AppConfig::load_from(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn engine_settings_follow_the_server_section() {
        let mut config = AppConfig::default();
        config.server.data_timeout_secs = 5;
        config.server.max_command_length = 1024;
        let settings = config.engine_settings();
        assert_eq!(settings.data_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_command_length, 1024);
    }
}
