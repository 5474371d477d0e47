//! Client connection representation.
//!
//! A [`Connection`] is the server-side handle of one TCP client. It never
//! touches the socket directly: packets are queued for the connection's writer
//! task, which owns the write half of the stream.

use lodestone_core::{ConnectionId, Packet};
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// An item for a connection's writer task, processed in queue order.
#[derive(Debug)]
pub enum Outbound {
    /// Write a framed packet to the buffered stream.
    Packet(Packet),
    /// Flush buffered bytes to the socket.
    Flush,
    /// Flush, shut down the write half and stop.
    Close,
}

/// Represents an individual client connection to the server.
///
/// # Fields
///
/// * `id` - Unique identifier assigned by the connection manager
/// * `remote_addr` - The network address of the connected client
/// * `connected_at` - Timestamp when the connection was established
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    connected_at: SystemTime,
    outbound: mpsc::Sender<Outbound>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Creates a connection feeding the given writer queue.
    pub fn new(id: ConnectionId, remote_addr: SocketAddr, outbound: mpsc::Sender<Outbound>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id,
            remote_addr,
            connected_at: SystemTime::now(),
            outbound,
            closed,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    /// Queues `packet` for the writer without waiting.
    ///
    /// Returns `false` when the connection is closed or its writer is backed up.
    pub fn send(&self, packet: Packet) -> bool {
        self.enqueue(Outbound::Packet(packet))
    }

    /// Asks the writer to flush everything queued so far.
    pub fn flush(&self) -> bool {
        self.enqueue(Outbound::Flush)
    }

    /// Marks the connection closed and tells the writer to finish.
    ///
    /// Items queued before the close are still written.
    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        debug!("🔌 Closing connection {}", self.id);
        if let Err(TrySendError::Full(_)) = self.outbound.try_send(Outbound::Close) {
            debug!("Writer queue of connection {} full while closing", self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        let mut receiver = self.closed.subscribe();
        let _ = receiver.wait_for(|closed| *closed).await;
    }

    fn enqueue(&self, item: Outbound) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.outbound.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("⚠️ Writer queue of connection {} is full; dropping output", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
