//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and tune the game server. Timing values are stored as
//! plain integers so the structure maps directly onto configuration files;
//! accessors convert them to [`Duration`]s.

use crate::error::ServerError;
use lodestone_core::RouterConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the game server.
///
/// Contains all parameters that shape networking, the simulation loop, session
/// buffering, message routing and the account workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Seconds a connection may stay silent before it is dropped
    pub idle_timeout_secs: u64,

    /// Largest accepted packet payload in bytes
    pub max_packet_size: usize,

    /// Tick and world settings
    pub simulation: SimulationConfig,

    /// Per-session queue sizes
    pub sessions: SessionConfig,

    /// Message router tuning
    pub router: RouterSettings,

    /// Account lookup workers
    pub accounts: AccountConfig,
}

/// Tick and world settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Interval between pulse ticks in milliseconds
    pub tick_interval_ms: u64,

    /// Maximum number of simultaneously reserved entities
    pub entity_capacity: u32,

    /// Commands pulled from each session per tick
    pub commands_per_tick: usize,

    /// Interval of the movement system in milliseconds
    pub movement_interval_ms: u64,
}

/// Bounded queue sizes for each session and connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub command_queue_capacity: usize,
    pub event_queue_capacity: usize,
    /// Outbound items buffered ahead of the socket writer
    pub writer_queue_capacity: usize,
}

/// Message router tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Upper bound on one mailbox delivery in milliseconds
    pub publish_timeout_ms: u64,
    pub mailbox_capacity: usize,
}

/// Account worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Capacity of the shared job queue
    pub job_queue_capacity: usize,
    /// How long a submission may wait for queue space, in milliseconds
    pub job_consume_timeout_ms: u64,
    /// How long a login waits for the repository answer, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Logins being authenticated at once; further requests are turned away
    pub max_pending_logins: usize,
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Budget a login request has from arrival to authentication outcome.
    pub fn login_deadline(&self) -> Duration {
        self.accounts.job_consume_timeout() + self.accounts.fetch_timeout()
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        let zero_checks: [(&str, u64); 15] = [
            ("max_connections", self.max_connections as u64),
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("max_packet_size", self.max_packet_size as u64),
            ("simulation.tick_interval_ms", self.simulation.tick_interval_ms),
            ("simulation.entity_capacity", self.simulation.entity_capacity as u64),
            ("simulation.commands_per_tick", self.simulation.commands_per_tick as u64),
            ("simulation.movement_interval_ms", self.simulation.movement_interval_ms),
            ("sessions.command_queue_capacity", self.sessions.command_queue_capacity as u64),
            ("sessions.event_queue_capacity", self.sessions.event_queue_capacity as u64),
            ("sessions.writer_queue_capacity", self.sessions.writer_queue_capacity as u64),
            ("router.publish_timeout_ms", self.router.publish_timeout_ms),
            ("router.mailbox_capacity", self.router.mailbox_capacity as u64),
            ("accounts.workers", self.accounts.workers as u64),
            ("accounts.job_queue_capacity", self.accounts.job_queue_capacity as u64),
            ("accounts.max_pending_logins", self.accounts.max_pending_logins as u64),
        ];
        for (name, value) in zero_checks {
            if value == 0 {
                return Err(ServerError::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.max_packet_size > u32::MAX as usize {
            return Err(ServerError::Config("max_packet_size does not fit a length prefix".to_string()));
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn movement_interval(&self) -> Duration {
        Duration::from_millis(self.movement_interval_ms)
    }
}

impl RouterSettings {
    pub fn to_router_config(&self) -> RouterConfig {
        RouterConfig {
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
            mailbox_capacity: self.mailbox_capacity,
        }
    }
}

impl AccountConfig {
    pub fn job_consume_timeout(&self) -> Duration {
        Duration::from_millis(self.job_consume_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 7777)),
            max_connections: 1000,
            idle_timeout_secs: 60,
            max_packet_size: 4096,
            simulation: SimulationConfig::default(),
            sessions: SessionConfig::default(),
            router: RouterSettings::default(),
            accounts: AccountConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50, // 20 ticks per second
            entity_capacity: 4096,
            commands_per_tick: 8,
            movement_interval_ms: 100,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 64,
            event_queue_capacity: 256,
            writer_queue_capacity: 512,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            publish_timeout_ms: 100,
            mailbox_capacity: 1024,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            job_queue_capacity: 64,
            job_consume_timeout_ms: 500,
            fetch_timeout_ms: 2000,
            max_pending_logins: 256,
        }
    }
}
