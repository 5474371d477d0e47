//! Error types and handling for the game server.
//!
//! This module defines the error types that can occur during server operations,
//! providing clear categorization of different failure modes.

/// Enumeration of possible server errors.
///
/// Categorizes errors by where they originate so callers can tell a startup
/// failure from a misbehaving client.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// A client sent bytes that cannot be framed or decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The configuration was rejected before startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors such as a service task failing
    #[error("Internal error: {0}")]
    Internal(String),
}
