//! Per-tick gameplay systems.
//!
//! Registered in this order, so within one tick commands are applied before
//! movement is integrated, and every event produced during the tick is drained
//! to the sockets at its end.

use super::components::{GameComponent, Transform, Velocity, PLAYER, TRANSFORM, VELOCITY};
use crate::messaging::{ClientCommand, ServerEvent};
use crate::session::{Session, SessionRegistry};
use lodestone_core::{ConnectionId, EntityHandle, EntityStore, Processor, WorldError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

fn player_connection(store: &EntityStore<GameComponent>, entity: EntityHandle) -> Option<ConnectionId> {
    match store.get_component(entity, PLAYER) {
        Some(GameComponent::Player(link)) => Some(link.connection),
        _ => None,
    }
}

fn broadcast(sessions: &SessionRegistry, event: &ServerEvent) {
    for session in sessions.snapshot() {
        session.queue_event(event.clone());
    }
}

/// Applies queued client commands and reaps finished sessions.
pub struct CommandSystem {
    sessions: Arc<SessionRegistry>,
    commands_per_tick: usize,
}

impl CommandSystem {
    pub fn new(sessions: Arc<SessionRegistry>, commands_per_tick: usize) -> Self {
        Self {
            sessions,
            commands_per_tick,
        }
    }

    fn reap(&self, entity: EntityHandle, connection: ConnectionId, store: &mut EntityStore<GameComponent>) -> Result<(), WorldError> {
        if let Some(session) = self.sessions.remove(connection) {
            session.terminate();
        }
        store.destroy_entity(entity)?;
        info!("🧹 Player entity {} of connection {} removed", entity, connection);
        Ok(())
    }

    fn apply(
        &self,
        command: ClientCommand,
        entity: EntityHandle,
        session: &Session,
        store: &mut EntityStore<GameComponent>,
    ) -> Result<(), WorldError> {
        match command {
            ClientCommand::Move(request) => {
                if request.dx == 0.0 && request.dy == 0.0 {
                    store.remove_component(entity, VELOCITY)?;
                } else {
                    let velocity = Velocity {
                        dx: request.dx,
                        dy: request.dy,
                    };
                    store.add_component(entity, GameComponent::Velocity(velocity))?;
                }
            }
            ClientCommand::Chat(say) => {
                broadcast(&self.sessions, &ServerEvent::ChatRelay { entity, text: say.text });
            }
            ClientCommand::Ping(ping) => {
                session.queue_event(ServerEvent::Pong { nonce: ping.nonce });
            }
            ClientCommand::Logout(_) => {
                self.reap(entity, session.connection_id(), store)?;
            }
            ClientCommand::Login(_) => {
                debug!("Connection {} sent a login while in the world", session.connection_id());
            }
        }
        Ok(())
    }
}

impl Processor<GameComponent> for CommandSystem {
    fn process(
        &mut self,
        entities: &[EntityHandle],
        store: &mut EntityStore<GameComponent>,
        _delta: Duration,
    ) -> Result<(), WorldError> {
        for &entity in entities {
            if !store.is_alive(entity) {
                continue;
            }
            let Some(connection) = player_connection(store, entity) else {
                continue;
            };
            let session = match self.sessions.get(connection) {
                Some(session) if !session.is_finished() => session,
                _ => {
                    self.reap(entity, connection, store)?;
                    continue;
                }
            };
            for _ in 0..self.commands_per_tick {
                let Some(command) = session.dequeue_command() else {
                    break;
                };
                trace!("Connection {} -> {:?}", connection, command);
                self.apply(command, entity, &session, store)?;
                if !store.is_alive(entity) {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Integrates velocities over a fixed step and announces new positions.
pub struct MovementSystem {
    sessions: Arc<SessionRegistry>,
    step: Duration,
}

impl MovementSystem {
    /// `step` must match the interval of the policy the system runs under.
    pub fn new(sessions: Arc<SessionRegistry>, step: Duration) -> Self {
        Self { sessions, step }
    }
}

impl Processor<GameComponent> for MovementSystem {
    fn process(
        &mut self,
        entities: &[EntityHandle],
        store: &mut EntityStore<GameComponent>,
        _delta: Duration,
    ) -> Result<(), WorldError> {
        let seconds = self.step.as_secs_f32();
        for &entity in entities {
            if !store.is_alive(entity) {
                continue;
            }
            let velocity = match store.get_component(entity, VELOCITY) {
                Some(GameComponent::Velocity(velocity)) => *velocity,
                _ => continue,
            };
            let moved = match store.get_component_mut(entity, TRANSFORM) {
                Some(GameComponent::Transform(transform)) => {
                    transform.x += velocity.dx * seconds;
                    transform.y += velocity.dy * seconds;
                    *transform
                }
                _ => {
                    store.add_component(entity, GameComponent::Transform(Transform::default()))?;
                    Transform::default()
                }
            };
            broadcast(
                &self.sessions,
                &ServerEvent::EntityMoved {
                    entity,
                    x: moved.x,
                    y: moved.y,
                },
            );
        }
        Ok(())
    }
}

/// Writes every queued event to its connection and flushes once per session.
///
/// An event the writer refuses is dropped and draining of that session stops
/// for this tick.
pub struct EventDrainSystem {
    sessions: Arc<SessionRegistry>,
}

impl EventDrainSystem {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }
}

impl Processor<GameComponent> for EventDrainSystem {
    fn process(
        &mut self,
        entities: &[EntityHandle],
        store: &mut EntityStore<GameComponent>,
        _delta: Duration,
    ) -> Result<(), WorldError> {
        for &entity in entities {
            let Some(session) = player_connection(store, entity).and_then(|c| self.sessions.get(c)) else {
                continue;
            };
            let mut written = 0usize;
            while let Some(event) = session.dequeue_event() {
                if !session.write(&event) {
                    // Writer full or closed; the rest stays queued for a later tick.
                    warn!(
                        "📭 Connection {} refused {:?}, {} event(s) left queued",
                        session.connection_id(),
                        event,
                        session.pending_events()
                    );
                    break;
                }
                written += 1;
            }
            if written > 0 {
                session.flush();
            }
        }
        Ok(())
    }
}
