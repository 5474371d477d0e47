//! Game world: components, systems and the task that owns them.

pub mod components;
pub mod runner;
pub mod systems;

pub use components::{GameComponent, PlayerLink, Transform, Velocity, PLAYER, TRANSFORM, VELOCITY};
pub use runner::Simulation;
pub use systems::{CommandSystem, EventDrainSystem, MovementSystem};
