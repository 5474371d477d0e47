//! Tracing subscriber setup and the startup banner.
//!
//! The configured level applies to the server's own crates (`lodestone`,
//! `game_server`, `lodestone_core`); everything else logs at `warn` and up.
//! A `RUST_LOG` variable replaces these directives entirely.

use crate::config::{AppConfig, LoggingSettings};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose output follows the configured level.
const SERVER_TARGETS: [&str; 3] = ["lodestone", "game_server", "lodestone_core"];

/// Filter directives for `level`, e.g. `warn,lodestone=info,game_server=info,...`.
pub fn filter_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in SERVER_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Installs the global subscriber.
///
/// # Arguments
///
/// * `config` - Logging section of the configuration file
/// * `json_format` - Forces JSON output regardless of the file setting
///
/// # Returns
///
/// An error if the filter cannot be parsed or a subscriber is already installed.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.level))?,
    };

    let json = json_format || config.json_format;
    let json_layer = json.then(|| fmt::layer().json().with_thread_ids(true).with_thread_names(true));
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    info!("🔧 Logging at '{}' ({} output)", config.level, if json { "json" } else { "text" });
    Ok(())
}

/// Logs the server name, version and the settings operators ask about first.
pub fn display_banner(config: &AppConfig) {
    info!("🧲 Lodestone v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "   listening on {} | {}ms ticks | up to {} entities",
        config.server.bind_address, config.simulation.tick_interval_ms, config.simulation.entity_capacity
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_the_level_to_server_crates() {
        assert_eq!(
            filter_directives("debug"),
            "warn,lodestone=debug,game_server=debug,lodestone_core=debug"
        );
    }

    #[test]
    fn directives_parse_for_every_accepted_level() {
        for level in crate::config::VALID_LOG_LEVELS {
            assert!(EnvFilter::try_new(filter_directives(level)).is_ok(), "{level}");
        }
    }
}
