//! The world: entity store plus the ordered list of systems.
//!
//! All mutation of the world happens on the task that owns it. Systems see a
//! consistent set of entities for the whole tick because structural changes are
//! only applied in phase 1 of [`World::update`].

use super::component::{Component, ComponentKind};
use super::entity::{EntityBuilder, EntityHandle};
use super::store::{EntityStore, Transition};
use super::system::{System, SystemId};
use crate::error::WorldError;
use std::time::Duration;
use tracing::{debug, trace};

/// Composition root of the simulation.
pub struct World<C: Component> {
    store: EntityStore<C>,
    systems: Vec<(SystemId, System<C>)>,
    pending_additions: Vec<(SystemId, System<C>)>,
    pending_removals: Vec<SystemId>,
    next_system_id: u32,
    ticks: u64,
}

impl<C: Component> World<C> {
    /// Creates an empty world holding at most `entity_capacity` entities.
    pub fn new(entity_capacity: u32) -> Self {
        Self {
            store: EntityStore::new(entity_capacity),
            systems: Vec::new(),
            pending_additions: Vec::new(),
            pending_removals: Vec::new(),
            next_system_id: 0,
            ticks: 0,
        }
    }

    pub fn create_entity(&mut self, builder: EntityBuilder<C>) -> Result<EntityHandle, WorldError> {
        self.store.create_entity(builder)
    }

    pub fn destroy_entity(&mut self, handle: EntityHandle) -> Result<(), WorldError> {
        self.store.destroy_entity(handle)
    }

    pub fn add_component(&mut self, handle: EntityHandle, component: C) -> Result<Option<C>, WorldError> {
        self.store.add_component(handle, component)
    }

    pub fn remove_component(&mut self, handle: EntityHandle, kind: ComponentKind) -> Result<Option<C>, WorldError> {
        self.store.remove_component(handle, kind)
    }

    pub fn get_component(&self, handle: EntityHandle, kind: ComponentKind) -> Option<&C> {
        self.store.get_component(handle, kind)
    }

    pub fn store(&self) -> &EntityStore<C> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore<C> {
        &mut self.store
    }

    /// Queues a system for registration at the next tick boundary.
    pub fn add_system(&mut self, system: System<C>) -> SystemId {
        let id = SystemId(self.next_system_id);
        self.next_system_id += 1;
        self.pending_additions.push((id, system));
        id
    }

    /// Queues a system for removal at the next tick boundary.
    pub fn remove_system(&mut self, id: SystemId) {
        self.pending_removals.push(id);
    }

    /// Registered system, if it has been applied.
    pub fn system(&self, id: SystemId) -> Option<&System<C>> {
        self.systems.iter().find(|(sid, _)| *sid == id).map(|(_, s)| s)
    }

    /// Number of systems currently registered.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Number of completed calls to [`World::update`].
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick.
    ///
    /// Phase 1 applies buffered entity changes, then system removals, then system
    /// additions. Phase 2 runs each system whose policy fires, in registration
    /// order. The first error stops phase 2 and is returned; the structural
    /// changes of phase 1 stay applied.
    pub fn update(&mut self, delta: Duration) -> Result<(), WorldError> {
        self.apply_structural_changes();

        self.ticks += 1;
        for (_, system) in self.systems.iter_mut() {
            if system.run(&mut self.store, delta)? {
                trace!("⚙️ System '{}' ran over {} entities", system.name(), system.entities().len());
            }
        }
        Ok(())
    }

    fn apply_structural_changes(&mut self) {
        for transition in self.store.apply_changes() {
            match transition {
                Transition::Added(handle, mask) | Transition::Changed(handle, mask) => {
                    for (_, system) in self.systems.iter_mut() {
                        system.resubscribe(handle, mask);
                    }
                }
                Transition::Removed(handle) => {
                    for (_, system) in self.systems.iter_mut() {
                        system.unsubscribe(handle);
                    }
                }
            }
        }

        if !self.pending_removals.is_empty() {
            let removals = std::mem::take(&mut self.pending_removals);
            self.systems.retain(|(id, system)| {
                let keep = !removals.contains(id);
                if !keep {
                    debug!("➖ System '{}' removed", system.name());
                }
                keep
            });
            // A system removed before it was ever applied never runs.
            self.pending_additions.retain(|(id, _)| !removals.contains(id));
        }

        for (id, mut system) in std::mem::take(&mut self.pending_additions) {
            for entity in self.store.visible() {
                if system.is_interested(entity.mask()) {
                    system.entities.push(entity.handle());
                }
            }
            debug!(
                "➕ System '{}' registered with {} matching entities",
                system.name(),
                system.entities().len()
            );
            self.systems.push((id, system));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::store::EntityStore;
    use crate::ecs::system::{AlwaysPolicy, IntervalPolicy, Policy};
    use crate::ecs::testing::{TestComponent, POSITION, TAG, VELOCITY};
    use crate::ecs::ComponentMask;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(&'static str, Vec<EntityHandle>)>>>;

    fn recording(name: &'static str, log: &Log) -> impl FnMut(&[EntityHandle], &mut EntityStore<TestComponent>, Duration) -> Result<(), WorldError> + Send {
        let log = log.clone();
        move |entities: &[EntityHandle], _store: &mut EntityStore<TestComponent>, _delta: Duration| {
            log.lock().unwrap().push((name, entities.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn added_system_backfills_only_matching_entities() {
        let mut world = World::new(16);
        let with_position = world
            .create_entity(EntityBuilder::new().with(TestComponent::Position(0.0, 0.0)))
            .unwrap();
        let tag_only = world
            .create_entity(EntityBuilder::new().with(TestComponent::Tag("plain")))
            .unwrap();
        let both = world
            .create_entity(
                EntityBuilder::new()
                    .with(TestComponent::Tag("both"))
                    .with(TestComponent::Position(1.0, 1.0)),
            )
            .unwrap();
        world.update(Duration::ZERO).unwrap();

        let log = Log::default();
        let id = world.add_system(System::new("movement", POSITION.bit(), AlwaysPolicy, recording("movement", &log)));
        assert!(world.system(id).is_none(), "additions wait for the tick boundary");

        world.update(Duration::from_millis(16)).unwrap();
        let system = world.system(id).expect("system applied");
        assert_eq!(system.entities(), &[with_position, both]);
        assert!(!system.entities().contains(&tag_only));
        assert_eq!(log.lock().unwrap().as_slice(), &[("movement", vec![with_position, both])]);
    }

    #[test]
    fn interest_matches_any_shared_kind() {
        let mut world = World::new(8);
        let log = Log::default();
        let id = world.add_system(System::new(
            "any",
            ComponentMask::of(&[POSITION, VELOCITY]),
            AlwaysPolicy,
            recording("any", &log),
        ));
        let velocity_only = world
            .create_entity(EntityBuilder::new().with(TestComponent::Velocity(3.0)))
            .unwrap();
        world.create_entity(EntityBuilder::new().with(TestComponent::Tag("x"))).unwrap();
        world.update(Duration::ZERO).unwrap();

        assert_eq!(world.system(id).unwrap().entities(), &[velocity_only]);
    }

    #[test]
    fn component_changes_resubscribe_at_next_tick() {
        let mut world = World::new(8);
        let log = Log::default();
        let id = world.add_system(System::new("velocity", VELOCITY.bit(), AlwaysPolicy, recording("velocity", &log)));
        let entity = world
            .create_entity(EntityBuilder::new().with(TestComponent::Tag("walker")))
            .unwrap();
        world.update(Duration::ZERO).unwrap();
        assert!(world.system(id).unwrap().entities().is_empty());

        world.add_component(entity, TestComponent::Velocity(1.0)).unwrap();
        assert!(world.system(id).unwrap().entities().is_empty());
        world.update(Duration::ZERO).unwrap();
        assert_eq!(world.system(id).unwrap().entities(), &[entity]);

        world.remove_component(entity, VELOCITY).unwrap();
        world.update(Duration::ZERO).unwrap();
        assert!(world.system(id).unwrap().entities().is_empty());
    }

    #[test]
    fn destroyed_entity_is_seen_for_the_rest_of_the_tick() {
        let mut world = World::new(8);
        let log = Log::default();
        let tags = TAG.bit();
        let destroyer = |entities: &[EntityHandle],
                         store: &mut EntityStore<TestComponent>,
                         _delta: Duration|
         -> Result<(), WorldError> {
            for handle in entities {
                if store.is_alive(*handle) {
                    store.destroy_entity(*handle)?;
                }
            }
            Ok(())
        };
        world.add_system(System::new("destroyer", tags, AlwaysPolicy, destroyer));
        let observer = world.add_system(System::new("observer", tags, AlwaysPolicy, recording("observer", &log)));

        let entity = world.create_entity(EntityBuilder::new().with(TestComponent::Tag("doomed"))).unwrap();
        world.update(Duration::ZERO).unwrap();

        // The destroyer ran first, but the observer still saw the entity this tick.
        assert_eq!(log.lock().unwrap().last().unwrap().1, vec![entity]);

        world.update(Duration::ZERO).unwrap();
        assert!(world.system(observer).unwrap().entities().is_empty());
        assert_eq!(log.lock().unwrap().last().unwrap().1, Vec::<EntityHandle>::new());
    }

    #[test]
    fn systems_run_in_registration_order_subject_to_policy() {
        let mut world: World<TestComponent> = World::new(4);
        let log = Log::default();
        world.add_system(System::new("first", TAG.bit(), AlwaysPolicy, recording("first", &log)));
        world.add_system(System::new(
            "slow",
            TAG.bit(),
            IntervalPolicy::new(Duration::from_millis(100)),
            recording("slow", &log),
        ));
        world.add_system(System::new("last", TAG.bit(), AlwaysPolicy, recording("last", &log)));

        world.update(Duration::from_millis(60)).unwrap();
        world.update(Duration::from_millis(60)).unwrap();

        let names: Vec<_> = log.lock().unwrap().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["first", "last", "first", "slow", "last"]);
    }

    struct FailingPolicy;

    impl Policy for FailingPolicy {
        fn should_run(&mut self, _delta: Duration) -> Result<bool, WorldError> {
            Err(WorldError::Policy {
                system: "broken",
                reason: "clock went backwards".into(),
            })
        }
    }

    #[test]
    fn policy_error_aborts_the_rest_of_the_tick() {
        let mut world: World<TestComponent> = World::new(4);
        let log = Log::default();
        world.add_system(System::new("before", TAG.bit(), AlwaysPolicy, recording("before", &log)));
        world.add_system(System::new("broken", TAG.bit(), FailingPolicy, recording("broken", &log)));
        world.add_system(System::new("after", TAG.bit(), AlwaysPolicy, recording("after", &log)));

        let err = world.update(Duration::ZERO).unwrap_err();
        assert!(matches!(err, WorldError::Policy { system: "broken", .. }));
        let names: Vec<_> = log.lock().unwrap().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["before"]);

        // The failure is local to the tick; the world keeps working.
        assert_eq!(world.system_count(), 3);
        assert_eq!(world.tick_count(), 1);
    }

    #[test]
    fn removed_system_stops_running() {
        let mut world: World<TestComponent> = World::new(4);
        let log = Log::default();
        let id = world.add_system(System::new("gone", TAG.bit(), AlwaysPolicy, recording("gone", &log)));
        world.update(Duration::ZERO).unwrap();
        assert_eq!(world.system_count(), 1);

        world.remove_system(id);
        world.update(Duration::ZERO).unwrap();
        assert_eq!(world.system_count(), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
