//! Configuration management for the Lodestone server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use game_server::{AccountConfig, RouterSettings, ServerConfig, SessionConfig, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Log levels accepted in `[logging] level`.
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
///
/// Sections other than `[server]` and `[logging]` may be omitted entirely;
/// missing keys take their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network settings
    pub server: ServerSettings,
    /// Tick and world settings
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Per-session queue sizes
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Message router tuning
    #[serde(default)]
    pub router: RouterSettings,
    /// Account workers and seeded accounts
    #[serde(default)]
    pub accounts: AccountSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:7777")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds a client may stay silent before it is disconnected
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Largest accepted packet payload in bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

fn default_max_connections() -> usize {
    1000
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_max_packet_size() -> usize {
    4096
}

/// Account worker settings plus accounts created at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSettings {
    #[serde(flatten)]
    pub pool: AccountConfig,
    /// Accounts inserted into the in-memory store on startup
    #[serde(default)]
    pub seed: Vec<SeedAccount>,
}

/// One `[[accounts.seed]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAccount {
    pub username: String,
    pub password: String,
}

/// Logging system configuration.
///
/// Controls log output format and level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:7777".to_string(),
                max_connections: default_max_connections(),
                idle_timeout_secs: default_idle_timeout(),
                max_packet_size: default_max_packet_size(),
            },
            simulation: SimulationConfig::default(),
            sessions: SessionConfig::default(),
            router: RouterSettings::default(),
            accounts: AccountSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration is written to `path`
    /// and returned.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded configuration, or an error if the file could not be read,
    /// parsed, or created.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration into the game server's.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let bind_address: SocketAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|e| format!("Invalid bind address '{}': {e}", self.server.bind_address))?;

        Ok(ServerConfig {
            bind_address,
            max_connections: self.server.max_connections,
            idle_timeout_secs: self.server.idle_timeout_secs,
            max_packet_size: self.server.max_packet_size,
            simulation: self.simulation.clone(),
            sessions: self.sessions.clone(),
            router: self.router.clone(),
            accounts: self.accounts.pool.clone(),
        })
    }

    /// Seeded accounts as `(username, password)` pairs.
    pub fn seed_accounts(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.accounts
            .seed
            .iter()
            .map(|account| (account.username.clone(), account.password.clone()))
    }

    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// `Ok(())` if every setting is usable, or a description of the first
    /// problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.server.bind_address));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        if self.accounts.seed.iter().any(|seed| seed.username.is_empty()) {
            return Err("accounts.seed entries need a username".to_string());
        }

        let server_config = self.to_server_config().map_err(|e| e.to_string())?;
        server_config.validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:7777");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.idle_timeout_secs, 60);
        assert_eq!(config.server.max_packet_size, 4096);
        assert_eq!(config.simulation.tick_interval_ms, 50);
        assert_eq!(config.simulation.entity_capacity, 4096);
        assert_eq!(config.router.publish_timeout_ms, 100);
        assert_eq!(config.accounts.pool.job_queue_capacity, 64);
        assert!(config.accounts.seed.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lodestone.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:7777");

        // The default file is written and reads back identically.
        assert!(path.exists());
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.server.bind_address, config.server.bind_address);
        assert_eq!(reloaded.simulation.tick_interval_ms, config.simulation.tick_interval_ms);
        assert_eq!(reloaded.accounts.pool.workers, config.accounts.pool.workers);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 2000
idle_timeout_secs = 90

[simulation]
tick_interval_ms = 33
entity_capacity = 128

[sessions]
command_queue_capacity = 16

[router]
publish_timeout_ms = 250

[accounts]
workers = 2
fetch_timeout_ms = 500

[[accounts.seed]]
username = "ada"
password = "lovelace"

[[accounts.seed]]
username = "grace"
password = "hopper"

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.max_connections, 2000);
        assert_eq!(config.server.idle_timeout_secs, 90);
        assert_eq!(config.server.max_packet_size, 4096);

        assert_eq!(config.simulation.tick_interval_ms, 33);
        assert_eq!(config.simulation.entity_capacity, 128);
        assert_eq!(config.simulation.commands_per_tick, 8);
        assert_eq!(config.sessions.command_queue_capacity, 16);
        assert_eq!(config.sessions.event_queue_capacity, 256);
        assert_eq!(config.router.publish_timeout_ms, 250);
        assert_eq!(config.router.mailbox_capacity, 1024);

        assert_eq!(config.accounts.pool.workers, 2);
        assert_eq!(config.accounts.pool.fetch_timeout_ms, 500);
        assert_eq!(config.accounts.pool.job_consume_timeout_ms, 500);
        assert_eq!(
            config.seed_accounts().collect::<Vec<_>>(),
            vec![
                ("ada".to_string(), "lovelace".to_string()),
                ("grace".to_string(), "hopper".to_string())
            ]
        );

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server\nbind_address = ").await.unwrap();

        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut config = AppConfig::default();
        config.server.bind_address = "0.0.0.0:9000".to_string();
        config.server.max_connections = 5;
        config.simulation.tick_interval_ms = 20;
        config.accounts.pool.workers = 3;

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(server_config.max_connections, 5);
        assert_eq!(server_config.simulation.tick_interval_ms, 20);
        assert_eq!(server_config.accounts.workers, 3);
    }

    #[test]
    fn test_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());
        assert!(config.to_server_config().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        for level in VALID_LOG_LEVELS {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} should be accepted");
        }
    }

    #[test]
    fn test_validation_zero_values() {
        let mut config = AppConfig::default();
        config.simulation.tick_interval_ms = 0;
        assert!(config.validate().unwrap_err().contains("tick_interval_ms"));

        let mut config = AppConfig::default();
        config.simulation.movement_interval_ms = 0;
        assert!(config.validate().unwrap_err().contains("movement_interval_ms"));

        let mut config = AppConfig::default();
        config.router.mailbox_capacity = 0;
        assert!(config.validate().unwrap_err().contains("mailbox_capacity"));
    }

    #[test]
    fn test_validation_empty_seed_username() {
        let mut config = AppConfig::default();
        config.accounts.seed.push(SeedAccount {
            username: String::new(),
            password: "pw".to_string(),
        });
        assert!(config.validate().is_err());
    }
}
