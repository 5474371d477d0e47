//! # Entity/component store and tick scheduler
//!
//! Entities are identity slots with a set of components attached. Systems
//! declare an interest mask and receive, every tick their policy allows, the
//! list of entities that share at least one component kind with that mask.
//!
//! ## Structural changes
//!
//! Creating or destroying entities and adding or removing components updates
//! the entity record at once, but subscriptions are only recomputed in the
//! first phase of [`World::update`]. A system therefore never sees its entity
//! list change while it iterates, and an entity destroyed mid-tick is still
//! handed to the systems that run after the destroyer.
//!
//! ```rust,ignore
//! let mut world = World::new(1024);
//! world.add_system(System::new("movement", VELOCITY.bit(), IntervalPolicy::new(rate), movement));
//! let player = world.create_entity(EntityBuilder::new().with(transform).with(link))?;
//! world.update(delta)?;
//! ```

mod component;
mod entity;
mod store;
mod system;
mod world;

pub use component::{Component, ComponentKind, ComponentMask, MAX_COMPONENT_KINDS};
pub use entity::{Entity, EntityBuilder, EntityHandle, EntityId};
pub use store::{EntityStore, Transition};
pub use system::{AlwaysPolicy, IntervalPolicy, Policy, Processor, System, SystemId};
pub use world::World;

#[cfg(test)]
pub(crate) mod testing {
    use super::{Component, ComponentKind};

    pub const POSITION: ComponentKind = ComponentKind::at(0);
    pub const VELOCITY: ComponentKind = ComponentKind::at(1);
    pub const TAG: ComponentKind = ComponentKind::at(2);

    #[derive(Debug, Clone, PartialEq)]
    pub enum TestComponent {
        Position(f32, f32),
        Velocity(f32),
        Tag(&'static str),
    }

    impl Component for TestComponent {
        fn kind(&self) -> ComponentKind {
            match self {
                TestComponent::Position(..) => POSITION,
                TestComponent::Velocity(_) => VELOCITY,
                TestComponent::Tag(_) => TAG,
            }
        }
    }
}
