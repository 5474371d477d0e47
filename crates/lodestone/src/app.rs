//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that turns the merged
//! configuration into a running server and shuts it down on a signal.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, spawn_forced_exit_handler},
};
use game_server::{create_server_with_accounts, GameServer};
use lodestone_core::ShutdownState;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long the server gets to wind down after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Main application struct.
///
/// Owns the merged configuration and the game server built from it.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Game server instance
    server: GameServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration loaded from the config file
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` ready to run, or an error if the merged
    /// configuration is invalid.
    ///
    /// # Process
    ///
    /// 1. Apply command-line argument overrides
    /// 2. Validate merged configuration
    /// 3. Display startup banner
    /// 4. Build the game server and seed its accounts
    pub fn new(mut config: AppConfig, args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        apply_overrides(&mut config, args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner(&config);

        let server = create_server_with_accounts(config.to_server_config()?, config.seed_accounts());
        Ok(Self { config, server })
    }

    /// Runs the server until a shutdown signal arrives, then waits for it to stop.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Lodestone server");
        self.log_configuration_summary();

        let shutdown_state = ShutdownState::new();
        let signal = setup_signal_handlers(&shutdown_state);
        Self::serve_until(self.server, shutdown_state.clone(), signal).await
    }

    /// Serves until `stop` resolves, then shuts the server down.
    ///
    /// If `stop` fails, shutdown is still initiated and the server awaited
    /// before the error is returned.
    async fn serve_until<F>(server: GameServer, shutdown_state: ShutdownState, stop: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = Result<(), Box<dyn std::error::Error>>>,
    {
        let mut server_handle = {
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move { server.start_with_shutdown_state(shutdown_state).await })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let stopped = tokio::select! {
            stopped = stop => stopped,
            finished = &mut server_handle => {
                // The server only returns on its own when startup failed.
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(format!("server task failed: {e}").into()),
                };
            }
        };

        match &stopped {
            Ok(()) => spawn_forced_exit_handler(),
            Err(e) => {
                error!("❌ Signal handling failed: {}; shutting the server down", e);
                shutdown_state.initiate_shutdown();
            }
        }
        info!("🧹 Waiting up to {:?} for the server to stop...", SHUTDOWN_TIMEOUT);

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Server task completed gracefully"),
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => {
                warn!("⏰ Server task did not complete within timeout; aborting it");
                server_handle.abort();
            }
        }

        info!("👋 Lodestone server shutdown complete");
        stopped
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  🕒 Tick: {}ms | Movement: {}ms",
            self.config.simulation.tick_interval_ms, self.config.simulation.movement_interval_ms
        );
        info!("  🧱 Entity capacity: {}", self.config.simulation.entity_capacity);
        info!(
            "  👷 Account workers: {} | Seeded accounts: {}",
            self.config.accounts.pool.workers,
            self.config.accounts.seed.len()
        );
    }
}

/// Applies command-line overrides on top of the file configuration.
pub fn apply_overrides(config: &mut AppConfig, args: CliArgs) {
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.simulation.tick_interval_ms = tick_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> CliArgs {
        CliArgs {
            config_path: PathBuf::from("config.toml"),
            bind_address: None,
            log_level: None,
            json_logs: false,
            tick_ms: None,
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = AppConfig::default();
        apply_overrides(
            &mut config,
            CliArgs {
                bind_address: Some("0.0.0.0:9000".to_string()),
                log_level: Some("trace".to_string()),
                json_logs: true,
                tick_ms: Some(16),
                ..args()
            },
        );

        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json_format);
        assert_eq!(config.simulation.tick_interval_ms, 16);
    }

    #[test]
    fn absent_overrides_keep_file_values() {
        let mut config = AppConfig::default();
        config.logging.json_format = true;
        apply_overrides(&mut config, args());

        assert_eq!(config.server.bind_address, "127.0.0.1:7777");
        assert!(config.logging.json_format);
        assert_eq!(config.simulation.tick_interval_ms, 50);
    }

    #[test]
    fn invalid_overrides_fail_application_creation() {
        let result = Application::new(
            AppConfig::default(),
            CliArgs {
                log_level: Some("chatty".to_string()),
                ..args()
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn application_builds_the_server_from_config() {
        let mut config = AppConfig::default();
        config.accounts.seed.push(crate::config::SeedAccount {
            username: "ada".to_string(),
            password: "lovelace".to_string(),
        });
        let app = Application::new(config, args()).unwrap();
        assert_eq!(app.server.config().bind_address.port(), 7777);
        assert!(app.server.sessions().is_empty());
    }

    #[tokio::test]
    async fn failed_signal_setup_still_stops_the_server() {
        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();
        let app = Application::new(config, args()).unwrap();
        let shutdown_state = ShutdownState::new();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Application::serve_until(app.server, shutdown_state.clone(), async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<(), Box<dyn std::error::Error>>("signal handlers unavailable".into())
            }),
        )
        .await
        .expect("server stopped within the timeout");

        assert_eq!(result.unwrap_err().to_string(), "signal handlers unavailable");
        assert!(shutdown_state.is_shutdown_initiated());
    }
}
