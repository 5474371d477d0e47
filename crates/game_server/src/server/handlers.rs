//! Connection handling logic for TCP clients.
//!
//! Each client gets two tasks: a reader that frames packets and publishes them
//! on the router, and a writer that drains the connection's outbound queue
//! into a buffered socket. The connection is removed from the manager once
//! both are done.

use crate::{
    connection::{ConnectionManager, Outbound},
    error::ServerError,
    messaging::{route_client_packet, ClientCommand, Inbound},
};
use lodestone_core::{
    codec::{read_packet, write_packet},
    ConnectionId, MessageRegistry, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// How long a closing connection may take to drain its writer.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a connection task needs from the server.
#[derive(Clone)]
pub struct ConnectionContext {
    pub connections: Arc<ConnectionManager>,
    pub router: Arc<Router<Inbound>>,
    pub registry: Arc<MessageRegistry<ClientCommand>>,
    pub idle_timeout: Duration,
    pub max_packet_size: usize,
    pub writer_capacity: usize,
    pub login_deadline: Duration,
}

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Register the connection and spawn its writer task
/// 2. Read packets until EOF, idle timeout, a protocol error or a server-side close
/// 3. Mark the connection closed and give the writer a bounded time to drain
/// 4. Remove the connection from the manager
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `context` - Shared server state
///
/// # Returns
///
/// `Ok(())` if the client went away normally, or a `ServerError` describing
/// why the connection was dropped.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, context: ConnectionContext) -> Result<(), ServerError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (mut reader, writer) = stream.into_split();
    let (connection, outbound) = context.connections.register(addr, context.writer_capacity);
    let id = connection.id();
    info!("👋 Connection {} opened from {}", id, addr);

    let mut writer_task = tokio::spawn(write_loop(id, BufWriter::new(writer), outbound));

    let result = loop {
        let read = tokio::select! {
            _ = connection.closed() => break Ok(()),
            read = timeout(context.idle_timeout, read_packet(&mut reader, context.max_packet_size)) => read,
        };

        let packet = match read {
            Err(_) => break Err(ServerError::Network(format!("connection {id} idle for {:?}", context.idle_timeout))),
            Ok(Ok(Some(packet))) => packet,
            Ok(Ok(None)) => break Ok(()),
            Ok(Err(e)) => break Err(ServerError::Protocol(format!("connection {id}: {e}"))),
        };

        trace!("📦 Connection {} sent kind {} ({} bytes)", id, packet.kind, packet.payload.len());
        if let Err(e) = route_client_packet(&packet, id, &context.registry, &context.router, context.login_deadline).await {
            break Err(e);
        }
    };

    connection.close();
    match timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Writer of connection {} failed: {}", id, e),
        Err(_) => {
            debug!("Writer of connection {} did not drain in time", id);
            writer_task.abort();
        }
    }
    context.connections.remove(id);

    match &result {
        Ok(()) => info!("👋 Connection {} closed", id),
        Err(e) => info!("👋 Connection {} dropped: {}", id, e),
    }
    result
}

async fn write_loop<W>(id: ConnectionId, mut writer: BufWriter<W>, mut outbound: mpsc::Receiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbound.recv().await {
        let written = match item {
            Outbound::Packet(packet) => write_packet(&mut writer, &packet).await.map_err(|e| e.to_string()),
            Outbound::Flush => writer.flush().await.map_err(|e| e.to_string()),
            Outbound::Close => {
                if let Err(e) = writer.flush().await {
                    debug!("Final flush for connection {} failed: {}", id, e);
                }
                let _ = writer.shutdown().await;
                return;
            }
        };
        if let Err(e) = written {
            debug!("Write to connection {} failed: {}", id, e);
            return;
        }
    }
}
