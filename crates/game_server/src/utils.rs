//! Utility functions and helper methods for the game server.
//!
//! This module provides convenient factory functions for creating server
//! instances with different configurations.

use crate::{auth::InMemoryAccountRepository, config::ServerConfig, server::GameServer};
use std::sync::Arc;
use tracing::info;

/// Creates a new game server with default configuration and no accounts.
///
/// # Example
///
/// ```rust
/// use game_server::create_server;
///
/// let server = create_server();
/// assert_eq!(server.sessions().len(), 0);
/// ```
pub fn create_server() -> GameServer {
    GameServer::new(ServerConfig::default())
}

/// Creates a new game server with custom configuration and no accounts.
///
/// # Example
///
/// ```rust
/// use game_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// assert_eq!(server.config().max_connections, 5000);
/// ```
pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    GameServer::new(config)
}

/// Creates a game server backed by an in-memory account store seeded with
/// `accounts`.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
/// * `accounts` - `(username, password)` pairs to create
pub fn create_server_with_accounts<I, U, P>(config: ServerConfig, accounts: I) -> GameServer
where
    I: IntoIterator<Item = (U, P)>,
    U: Into<String>,
    P: Into<String>,
{
    let repository = InMemoryAccountRepository::new();
    for (username, password) in accounts {
        repository.insert(username, password);
    }
    info!("📒 Seeded {} account(s)", repository.len());
    GameServer::with_repository(config, Arc::new(repository))
}
