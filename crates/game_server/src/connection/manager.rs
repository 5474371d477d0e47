//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central registry of live connections. The network
//! layer registers a connection when a client is accepted and removes it when
//! the reader loop ends; services look connections up by id to reply to
//! clients that have no session yet.

use super::client::{Connection, Outbound};
use dashmap::DashMap;
use lodestone_core::ConnectionId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Central manager for all client connections.
///
/// # Architecture
///
/// * Uses a sharded `DashMap` so lookups never wait on unrelated connections
/// * Implements atomic connection ID generation
/// * Each registered connection gets its own bounded writer queue
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to live connection
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// Atomic counter for generating unique connection IDs
    next_id: AtomicUsize,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Registers a new connection and returns it with its writer queue.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    /// * `writer_capacity` - Bound of the outbound queue
    ///
    /// # Returns
    ///
    /// The shared connection handle and the receiving end its writer drains.
    pub fn register(&self, remote_addr: SocketAddr, writer_capacity: usize) -> (Arc<Connection>, mpsc::Receiver<Outbound>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(writer_capacity.max(1));
        let connection = Arc::new(Connection::new(id, remote_addr, tx));
        self.connections.insert(id, connection.clone());
        info!("🔗 Connection {} from {}", id, remote_addr);
        (connection, rx)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Removes a connection from the manager, closing it.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(&id)?;
        connection.close();
        info!("❌ Connection {} from {} disconnected", id, connection.remote_addr());
        Some(connection)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Closes every live connection; their handlers remove them.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for entry in self.connections.iter() {
            entry.value().close();
            closed += 1;
        }
        closed
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
