//! The bridge between one connection and the simulation.

use crate::auth::AccountId;
use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::messaging::{ClientCommand, ServerEvent};
use crossbeam::queue::ArrayQueue;
use lodestone_core::{ConnectionId, EntityHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// An authenticated client in the world.
///
/// Commands arrive from the network side through [`Session::queue_command`] and
/// are pulled by the simulation each tick. Events flow the other way through
/// [`Session::queue_event`] and are drained to the connection's writer at the
/// end of the tick. Both queues are bounded and never block; when full, the
/// newest item is dropped.
#[derive(Debug)]
pub struct Session {
    connection: Arc<Connection>,
    account: AccountId,
    entity: EntityHandle,
    commands: ArrayQueue<ClientCommand>,
    events: ArrayQueue<ServerEvent>,
    terminated: AtomicBool,
}

impl Session {
    pub fn new(connection: Arc<Connection>, account: AccountId, entity: EntityHandle, config: &SessionConfig) -> Self {
        Self {
            connection,
            account,
            entity,
            commands: ArrayQueue::new(config.command_queue_capacity.max(1)),
            events: ArrayQueue::new(config.event_queue_capacity.max(1)),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    /// Queues a command for the simulation. Returns `false` if it was dropped.
    pub fn queue_command(&self, command: ClientCommand) -> bool {
        if self.is_terminated() {
            return false;
        }
        match self.commands.push(command) {
            Ok(()) => true,
            Err(dropped) => {
                debug!("Command queue of connection {} full; dropped {:?}", self.connection_id(), dropped);
                false
            }
        }
    }

    pub fn dequeue_command(&self) -> Option<ClientCommand> {
        if self.is_terminated() {
            return None;
        }
        self.commands.pop()
    }

    /// Queues an event for the client. Returns `false` if it was dropped.
    pub fn queue_event(&self, event: ServerEvent) -> bool {
        if self.is_terminated() {
            return false;
        }
        match self.events.push(event) {
            Ok(()) => true,
            Err(_) => {
                debug!("Event queue of connection {} full; event dropped", self.connection_id());
                false
            }
        }
    }

    pub fn dequeue_event(&self) -> Option<ServerEvent> {
        if self.is_terminated() {
            return None;
        }
        self.events.pop()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Hands `event` straight to the writer and flushes.
    pub fn send(&self, event: &ServerEvent) -> bool {
        self.write(event) && self.flush()
    }

    /// Hands `event` to the writer without flushing.
    pub fn write(&self, event: &ServerEvent) -> bool {
        self.connection.send(event.to_packet())
    }

    pub fn flush(&self) -> bool {
        self.connection.flush()
    }

    /// Closes both queues and the connection. Idempotent.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        while self.commands.pop().is_some() {}
        while self.events.pop().is_some() {}
        self.connection.close();
        info!("👋 Session of connection {} (account {}) terminated", self.connection_id(), self.account);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// True when the session should be reaped: terminated, or its connection gone.
    pub fn is_finished(&self) -> bool {
        self.is_terminated() || self.connection.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::messaging::Ping;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn session(commands: usize) -> (Session, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(16);
        let connection = Arc::new(Connection::new(9, SocketAddr::from(([127, 0, 0, 1], 1)), tx));
        let config = SessionConfig {
            command_queue_capacity: commands,
            event_queue_capacity: 4,
            writer_queue_capacity: 16,
        };
        (Session::new(connection, AccountId(1), EntityHandle::new(0, 0), &config), rx)
    }

    fn ping(nonce: u32) -> ClientCommand {
        ClientCommand::Ping(Ping { nonce })
    }

    #[test]
    fn full_command_queue_drops_the_newest() {
        let (session, _rx) = session(2);
        assert!(session.queue_command(ping(1)));
        assert!(session.queue_command(ping(2)));
        assert!(!session.queue_command(ping(3)));

        assert_eq!(session.dequeue_command(), Some(ping(1)));
        assert_eq!(session.dequeue_command(), Some(ping(2)));
        assert_eq!(session.dequeue_command(), None);
    }

    #[tokio::test]
    async fn send_writes_and_flushes() {
        let (session, mut rx) = session(2);
        assert!(session.send(&ServerEvent::Pong { nonce: 5 }));
        assert!(matches!(rx.recv().await, Some(Outbound::Packet(p)) if p.kind == ServerEvent::PONG));
        assert!(matches!(rx.recv().await, Some(Outbound::Flush)));
    }

    #[tokio::test]
    async fn terminate_closes_queues_and_connection() {
        let (session, mut rx) = session(2);
        session.queue_command(ping(1));
        session.queue_event(ServerEvent::Pong { nonce: 1 });

        session.terminate();
        assert!(session.is_terminated());
        assert!(session.is_finished());
        assert!(!session.queue_command(ping(2)));
        assert!(session.dequeue_command().is_none());
        assert!(session.dequeue_event().is_none());
        assert!(!session.write(&ServerEvent::Pong { nonce: 2 }));
        assert!(matches!(rx.recv().await, Some(Outbound::Close)));
    }
}
