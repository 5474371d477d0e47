//! The simulation task.
//!
//! Owns the world. Between pulse ticks it consumes its mailbox: authenticated
//! clients become sessions, commands are queued on their session, and on each
//! tick the world is advanced by the wall-clock time since the previous one.

use super::components::{GameComponent, PlayerLink, Transform, PLAYER, VELOCITY};
use super::systems::{CommandSystem, EventDrainSystem, MovementSystem};
use crate::auth::Account;
use crate::config::{ServerConfig, SessionConfig};
use crate::connection::ConnectionManager;
use crate::messaging::{Inbound, ServerEvent};
use crate::session::{Session, SessionRegistry};
use lodestone_core::{
    AlwaysPolicy, ConnectionId, EntityBuilder, IntervalPolicy, Mail, Mailbox, System, Ticks, World, WorldError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Single owner of the game world.
pub struct Simulation {
    world: World<GameComponent>,
    sessions: Arc<SessionRegistry>,
    connections: Arc<ConnectionManager>,
    session_config: SessionConfig,
}

impl Simulation {
    /// Builds the world and registers the gameplay systems.
    pub fn new(config: &ServerConfig, sessions: Arc<SessionRegistry>, connections: Arc<ConnectionManager>) -> Self {
        let mut world = World::new(config.simulation.entity_capacity);
        let movement_step = config.simulation.movement_interval();

        world.add_system(System::new(
            "commands",
            PLAYER.bit(),
            AlwaysPolicy,
            CommandSystem::new(sessions.clone(), config.simulation.commands_per_tick),
        ));
        world.add_system(System::new(
            "movement",
            VELOCITY.bit(),
            IntervalPolicy::new(movement_step),
            MovementSystem::new(sessions.clone(), movement_step),
        ));
        world.add_system(System::new(
            "event_drain",
            PLAYER.bit(),
            AlwaysPolicy,
            EventDrainSystem::new(sessions.clone()),
        ));

        Self {
            world,
            sessions,
            connections,
            session_config: config.sessions.clone(),
        }
    }

    pub fn world(&self) -> &World<GameComponent> {
        &self.world
    }

    /// Runs until the pulse stops, then terminates every session.
    pub async fn run(mut self, mut ticks: Ticks, mut mailbox: Mailbox<Inbound>) {
        info!("🌍 Simulation started");
        let mut last_tick = Instant::now();
        let mut mailbox_open = true;

        loop {
            tokio::select! {
                tick = ticks.recv() => {
                    if tick.is_none() {
                        break;
                    }
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick);
                    last_tick = now;
                    self.tick(delta);
                }
                mail = mailbox.recv(), if mailbox_open => match mail {
                    Some(mail) => self.handle_mail(mail),
                    None => {
                        warn!("📭 Simulation mailbox closed; only ticking from now on");
                        mailbox_open = false;
                    }
                },
            }
        }

        let terminated = self.terminate_all();
        info!("🌍 Simulation stopped after {} ticks, {} sessions terminated", self.world.tick_count(), terminated);
    }

    /// Advances the world by `delta`. Failures are logged; the next tick runs normally.
    pub fn tick(&mut self, delta: Duration) {
        if let Err(e) = self.world.update(delta) {
            error!("❌ Tick {} failed: {}", self.world.tick_count(), e);
        }
    }

    /// Applies one piece of mail addressed to the simulation.
    pub fn handle_mail(&mut self, mail: Mail<Inbound>) {
        match mail.payload {
            Inbound::Authenticated(account) => self.admit(mail.client, account),
            Inbound::Command(command) => match self.sessions.get(mail.client) {
                Some(session) => {
                    if !session.queue_command(command) {
                        debug!("Command from connection {} dropped", mail.client);
                    }
                }
                None => debug!("Command from connection {} without a session dropped", mail.client),
            },
        }
    }

    fn admit(&mut self, client: ConnectionId, account: Account) {
        let Some(connection) = self.connections.get(client) else {
            debug!("Connection {} left before it could join", client);
            return;
        };
        if self.sessions.get(client).is_some() {
            warn!("Connection {} authenticated twice; ignoring", client);
            return;
        }

        let builder = EntityBuilder::new()
            .with(GameComponent::Transform(Transform::default()))
            .with(GameComponent::Player(PlayerLink {
                connection: client,
                account: account.id,
            }));
        let entity = match self.world.create_entity(builder) {
            Ok(entity) => entity,
            Err(WorldError::Capacity { capacity }) => {
                warn!("🈵 World full ({} entities); turning away connection {}", capacity, client);
                connection.send(ServerEvent::rejected("server is full").to_packet());
                connection.flush();
                connection.close();
                return;
            }
            Err(e) => {
                error!("Could not create an entity for connection {}: {}", client, e);
                connection.close();
                return;
            }
        };

        let session = Arc::new(Session::new(connection, account.id, entity, &self.session_config));
        self.sessions.put(session.clone());
        session.send(&ServerEvent::LoginAccepted { entity });
        info!("🎮 '{}' joined on connection {} as entity {}", account.username, client, entity);
    }

    fn terminate_all(&mut self) -> usize {
        let sessions = self.sessions.snapshot();
        for session in &sessions {
            self.sessions.remove(session.connection_id());
            session.terminate();
            if let Err(e) = self.world.destroy_entity(session.entity()) {
                debug!("Entity of connection {} already gone: {}", session.connection_id(), e);
            }
        }
        sessions.len()
    }
}
