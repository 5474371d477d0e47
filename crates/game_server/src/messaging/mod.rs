//! Message handling and routing for client-server communication.
//!
//! This module defines the wire messages, the router payload, and the glue that
//! turns a framed client packet into mail on the right topic.

pub mod router;
pub mod types;

pub use router::route_client_packet;
pub use types::{
    command_registry, ChatSay, ClientCommand, Inbound, LoginRequest, LogoutRequest, MoveRequest, Ping,
    ServerEvent, AUTH_EVENTS, AUTH_LOGIN, WORLD_CHAT, WORLD_COMMANDS,
};
