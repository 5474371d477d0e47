//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections: id assignment,
//! the bounded outbound queue each connection writes through, and the closed
//! flag that stops its reader and writer tasks.

pub mod client;
pub mod manager;

pub use client::{Connection, Outbound};
pub use manager::ConnectionManager;
