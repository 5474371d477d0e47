//! Component records of the game world.

use crate::auth::AccountId;
use lodestone_core::{Component, ComponentKind, ConnectionId};

pub const TRANSFORM: ComponentKind = ComponentKind::at(0);
pub const VELOCITY: ComponentKind = ComponentKind::at(1);
pub const PLAYER: ComponentKind = ComponentKind::at(2);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
}

/// Units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

/// Ties an entity to the session controlling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLink {
    pub connection: ConnectionId,
    pub account: AccountId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameComponent {
    Transform(Transform),
    Velocity(Velocity),
    Player(PlayerLink),
}

impl Component for GameComponent {
    fn kind(&self) -> ComponentKind {
        match self {
            GameComponent::Transform(_) => TRANSFORM,
            GameComponent::Velocity(_) => VELOCITY,
            GameComponent::Player(_) => PLAYER,
        }
    }
}
