//! # Game Server
//!
//! The networked half of Lodestone: TCP connections, login, sessions and the
//! gameplay simulation built on the `lodestone_core` world.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Connection Manager** - TCP lifecycle and per-connection writer queues
//! * **Router** - topic mail between readers, the login service and the simulation
//! * **Login Service** - credential checks through a bounded account worker pool
//! * **Simulation** - the single task owning the world, advanced by the pulse
//! * **Session Registry** - authenticated clients and their bounded queues
//!
//! ### Message Flow
//!
//! 1. A client sends a framed packet (kind byte, varint length, payload)
//! 2. The reader decodes it through the message registry
//! 3. The command is published on its topic (`auth.login`, `world.commands`, `world.chat`)
//! 4. The login service or the simulation consumes it
//! 5. Replies are queued on the session and written at the end of the tick
//!
//! ## Configuration
//!
//! The server is configured through the [`ServerConfig`] struct:
//!
//! * **Network settings** - bind address, connection limit, idle timeout, packet size
//! * **Simulation** - tick interval, entity capacity, per-tick command budget
//! * **Sessions and router** - queue capacities and the publish timeout
//! * **Accounts** - worker count and lookup timeouts
//!
//! ## Error Handling
//!
//! Failures are categorized by [`ServerError`]:
//!
//! * **Network errors** - binding and socket failures, idle clients
//! * **Protocol errors** - malformed frames; the connection is dropped
//! * **Config errors** - rejected before anything starts
//! * **Internal errors** - a service task failed

pub use config::{AccountConfig, RouterSettings, ServerConfig, SessionConfig, SimulationConfig};
pub use error::ServerError;
pub use server::GameServer;
pub use utils::{create_server, create_server_with_accounts, create_server_with_config};

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod server;
pub mod session;
pub mod simulation;
pub mod utils;


#[cfg(test)]
mod auth_integration_tests;
