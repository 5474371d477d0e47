//! Message type definitions for client-server communication.
//!
//! Client messages each implement [`Message`], which fixes their kind byte and
//! the router topic they are published on. Server events share one enum and are
//! encoded by [`ServerEvent::to_packet`].
//!
//! | Kind | Message | Topic |
//! |------|---------|-------|
//! | 0 | [`LoginRequest`] | `auth.login` |
//! | 1 | [`MoveRequest`] | `world.commands` |
//! | 2 | [`ChatSay`] | `world.chat` |
//! | 3 | [`Ping`] | `world.commands` |
//! | 4 | [`LogoutRequest`] | `world.commands` |
//! | 128..=132 | [`ServerEvent`] | outbound only |

use crate::auth::Account;
use lodestone_core::{CodecError, EntityHandle, FieldReader, FieldWriter, Message, MessageRegistry, Packet, Topic};

/// Login requests, consumed by the login service.
pub const AUTH_LOGIN: Topic = Topic::new("auth.login");
/// Successful authentications, consumed by the simulation.
pub const AUTH_EVENTS: Topic = Topic::new("auth.events");
/// Per-session gameplay commands, consumed by the simulation.
pub const WORLD_COMMANDS: Topic = Topic::new("world.commands");
/// Chat lines, consumed by the simulation.
pub const WORLD_CHAT: Topic = Topic::new("world.chat");

#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl Message for LoginRequest {
    const KIND: u8 = 0;
    const TOPIC: Topic = AUTH_LOGIN;

    fn demarshal(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(payload);
        let username = reader.string("username")?;
        let password = reader.string("password")?;
        reader.finish()?;
        Ok(Self { username, password })
    }

    fn marshal(&self, buf: &mut Vec<u8>) {
        FieldWriter::new(buf).put_str(&self.username).put_str(&self.password);
    }
}

/// Sets the player's velocity. A zero vector stops movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub dx: f32,
    pub dy: f32,
}

impl Message for MoveRequest {
    const KIND: u8 = 1;
    const TOPIC: Topic = WORLD_COMMANDS;

    fn demarshal(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(payload);
        let dx = reader.f32("dx")?;
        let dy = reader.f32("dy")?;
        reader.finish()?;
        if !dx.is_finite() || !dy.is_finite() {
            return Err(CodecError::InvalidField("velocity must be finite".to_string()));
        }
        Ok(Self { dx, dy })
    }

    fn marshal(&self, buf: &mut Vec<u8>) {
        FieldWriter::new(buf).put_f32(self.dx).put_f32(self.dy);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSay {
    pub text: String,
}

impl Message for ChatSay {
    const KIND: u8 = 2;
    const TOPIC: Topic = WORLD_CHAT;

    fn demarshal(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(payload);
        let text = reader.string("text")?;
        reader.finish()?;
        Ok(Self { text })
    }

    fn marshal(&self, buf: &mut Vec<u8>) {
        FieldWriter::new(buf).put_str(&self.text);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub nonce: u32,
}

impl Message for Ping {
    const KIND: u8 = 3;
    const TOPIC: Topic = WORLD_COMMANDS;

    fn demarshal(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(payload);
        let nonce = reader.u32("nonce")?;
        reader.finish()?;
        Ok(Self { nonce })
    }

    fn marshal(&self, buf: &mut Vec<u8>) {
        FieldWriter::new(buf).put_u32(self.nonce);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutRequest;

impl Message for LogoutRequest {
    const KIND: u8 = 4;
    const TOPIC: Topic = WORLD_COMMANDS;

    fn demarshal(payload: &[u8]) -> Result<Self, CodecError> {
        FieldReader::new(payload).finish()?;
        Ok(Self)
    }

    fn marshal(&self, _buf: &mut Vec<u8>) {}
}

/// Every message a client can send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Login(LoginRequest),
    Move(MoveRequest),
    Chat(ChatSay),
    Ping(Ping),
    Logout(LogoutRequest),
}

impl ClientCommand {
    /// Encodes the command the way a client sends it.
    pub fn to_packet(&self) -> Packet {
        match self {
            ClientCommand::Login(m) => m.to_packet(),
            ClientCommand::Move(m) => m.to_packet(),
            ClientCommand::Chat(m) => m.to_packet(),
            ClientCommand::Ping(m) => m.to_packet(),
            ClientCommand::Logout(m) => m.to_packet(),
        }
    }
}

/// Builds the registry of every client message.
pub fn command_registry() -> MessageRegistry<ClientCommand> {
    MessageRegistry::new()
        .register(ClientCommand::Login)
        .register(ClientCommand::Move)
        .register(ClientCommand::Chat)
        .register(ClientCommand::Ping)
        .register(ClientCommand::Logout)
}

/// Payload carried by the server's router.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A decoded client message.
    Command(ClientCommand),
    /// The login service accepted the client's credentials.
    Authenticated(Account),
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    LoginAccepted { entity: EntityHandle },
    LoginRejected { reason: String },
    EntityMoved { entity: EntityHandle, x: f32, y: f32 },
    ChatRelay { entity: EntityHandle, text: String },
    Pong { nonce: u32 },
}

impl ServerEvent {
    pub const LOGIN_ACCEPTED: u8 = 128;
    pub const LOGIN_REJECTED: u8 = 129;
    pub const ENTITY_MOVED: u8 = 130;
    pub const CHAT_RELAY: u8 = 131;
    pub const PONG: u8 = 132;

    pub fn rejected(reason: impl Into<String>) -> Self {
        ServerEvent::LoginRejected { reason: reason.into() }
    }

    pub fn kind(&self) -> u8 {
        match self {
            ServerEvent::LoginAccepted { .. } => Self::LOGIN_ACCEPTED,
            ServerEvent::LoginRejected { .. } => Self::LOGIN_REJECTED,
            ServerEvent::EntityMoved { .. } => Self::ENTITY_MOVED,
            ServerEvent::ChatRelay { .. } => Self::CHAT_RELAY,
            ServerEvent::Pong { .. } => Self::PONG,
        }
    }

    pub fn to_packet(&self) -> Packet {
        let mut payload = Vec::new();
        let mut writer = FieldWriter::new(&mut payload);
        match self {
            ServerEvent::LoginAccepted { entity } => {
                put_entity(&mut writer, *entity);
            }
            ServerEvent::LoginRejected { reason } => {
                writer.put_str(reason);
            }
            ServerEvent::EntityMoved { entity, x, y } => {
                put_entity(&mut writer, *entity);
                writer.put_f32(*x).put_f32(*y);
            }
            ServerEvent::ChatRelay { entity, text } => {
                put_entity(&mut writer, *entity);
                writer.put_str(text);
            }
            ServerEvent::Pong { nonce } => {
                writer.put_u32(*nonce);
            }
        }
        Packet::new(self.kind(), payload)
    }

    /// Decodes an event packet, as a client would.
    pub fn from_packet(packet: &Packet) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(&packet.payload);
        let event = match packet.kind {
            Self::LOGIN_ACCEPTED => ServerEvent::LoginAccepted {
                entity: read_entity(&mut reader)?,
            },
            Self::LOGIN_REJECTED => ServerEvent::LoginRejected {
                reason: reader.string("reason")?,
            },
            Self::ENTITY_MOVED => ServerEvent::EntityMoved {
                entity: read_entity(&mut reader)?,
                x: reader.f32("x")?,
                y: reader.f32("y")?,
            },
            Self::CHAT_RELAY => ServerEvent::ChatRelay {
                entity: read_entity(&mut reader)?,
                text: reader.string("text")?,
            },
            Self::PONG => ServerEvent::Pong {
                nonce: reader.u32("nonce")?,
            },
            other => return Err(CodecError::UnknownKind(other)),
        };
        reader.finish()?;
        Ok(event)
    }
}

fn put_entity(writer: &mut FieldWriter<'_>, entity: EntityHandle) {
    writer.put_u32(entity.id()).put_u32(entity.generation());
}

fn read_entity(reader: &mut FieldReader<'_>) -> Result<EntityHandle, CodecError> {
    let id = reader.u32("entity.id")?;
    let generation = reader.u32("entity.generation")?;
    Ok(EntityHandle::new(id, generation))
}
