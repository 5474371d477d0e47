//! # Lodestone Core
//!
//! The simulation core of the Lodestone game server: everything that decides
//! *when* game logic runs and *how* messages reach it, with no knowledge of the
//! game itself.
//!
//! ## Core Features
//!
//! - **Entity/Component Store**: Generational entity handles, 64 component kinds,
//!   structural changes buffered until the tick boundary
//! - **Tick Scheduler**: Systems with run policies and interest masks, applied in
//!   registration order
//! - **Pulse Clock**: Fixed-rate ticks that never burst to catch up
//! - **Topic Router**: Bounded mailboxes with per-recipient publish timeouts
//! - **Wire Codec**: Packet framing and a registry mapping kind bytes to commands
//!
//! ## Architecture Overview
//!
//! One task owns the [`World`] and drives it from the [`pulse`] clock. Every other
//! task talks to it through the [`Router`]: network readers publish decoded
//! commands, services publish results, and the simulation task consumes its
//! mailbox between ticks. Nothing else touches entity state.
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use lodestone_core::*;
//! use std::time::Duration;
//!
//! #[derive(Clone)]
//! enum Parts {
//!     Position(f32, f32),
//! }
//!
//! const POSITION: ComponentKind = ComponentKind::at(0);
//!
//! impl Component for Parts {
//!     fn kind(&self) -> ComponentKind {
//!         POSITION
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut world = World::new(1024);
//!     world.add_system(System::new(
//!         "drift",
//!         POSITION.bit(),
//!         AlwaysPolicy,
//!         |entities: &[EntityHandle], store: &mut EntityStore<Parts>, _dt: Duration| -> Result<(), WorldError> {
//!             for handle in entities {
//!                 if let Some(Parts::Position(x, _)) = store.get_component_mut(*handle, POSITION) {
//!                     *x += 1.0;
//!                 }
//!             }
//!             Ok(())
//!         },
//!     ));
//!     world.create_entity(EntityBuilder::new().with(Parts::Position(0.0, 0.0)))?;
//!
//!     let (pulse, mut ticks) = pulse::start(Duration::from_millis(50));
//!     let mut last = tokio::time::Instant::now();
//!     for _ in 0..10 {
//!         if ticks.recv().await.is_none() {
//!             break;
//!         }
//!         let now = tokio::time::Instant::now();
//!         world.update(now - last)?;
//!         last = now;
//!     }
//!     pulse.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod ecs;
pub mod error;
pub mod pulse;
pub mod router;
pub mod shutdown;
pub mod types;

pub use codec::{FieldReader, FieldWriter, Message, MessageConfig, MessageRegistry, Packet};
pub use ecs::{
    AlwaysPolicy, Component, ComponentKind, ComponentMask, Entity, EntityBuilder, EntityHandle,
    EntityStore, IntervalPolicy, Policy, Processor, System, SystemId, Transition, World,
};
pub use error::{CodecError, RouterError, WorldError};
pub use pulse::{PulseHandle, Ticks};
pub use router::{Mail, Mailbox, MailboxId, Router, RouterConfig};
pub use shutdown::ShutdownState;
pub use types::{ConnectionId, Topic};
