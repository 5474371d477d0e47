//! Entity/component store.
//!
//! Owns every entity record and the pool of identities. Structural changes
//! (creation, destruction, component set changes) take effect on the record
//! immediately but reach the scheduler only through [`EntityStore::apply_changes`],
//! which the world calls once at the start of each tick.

use super::component::{Component, ComponentKind, ComponentMask};
use super::entity::{Entity, EntityBuilder, EntityHandle, EntityId};
use crate::error::WorldError;
use std::collections::HashMap;
use tracing::trace;

/// A change the scheduler must react to, produced by [`EntityStore::apply_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The entity became visible with this mask.
    Added(EntityHandle, ComponentMask),
    /// A visible entity's mask changed.
    Changed(EntityHandle, ComponentMask),
    /// The entity is gone.
    Removed(EntityHandle),
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Created(EntityHandle),
    Destroyed(EntityHandle),
    Changed(EntityHandle),
}

/// Arena of entities addressed by [`EntityHandle`].
pub struct EntityStore<C> {
    capacity: u32,
    /// Current generation of every identity ever issued.
    generations: Vec<u32>,
    /// Released identities, reused last-in first-out.
    free: Vec<EntityId>,
    /// Visible entities, indexed by identity.
    live: Vec<Option<Entity<C>>>,
    /// Created entities waiting for the next structural pass.
    pending: HashMap<EntityId, Entity<C>>,
    changes: Vec<Change>,
}

impl<C: Component> EntityStore<C> {
    /// Creates a store holding at most `capacity` entities at once.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            generations: Vec::new(),
            free: Vec::new(),
            live: Vec::new(),
            pending: HashMap::new(),
            changes: Vec::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reserves an identity and queues the entity for the next structural pass.
    pub fn create_entity(&mut self, builder: EntityBuilder<C>) -> Result<EntityHandle, WorldError> {
        let id = self.reserve_identity()?;
        let handle = EntityHandle::new(id, self.generations[id as usize]);
        self.pending.insert(id, builder.build(handle));
        self.changes.push(Change::Created(handle));
        trace!("🧱 Entity {} reserved", handle);
        Ok(handle)
    }

    fn reserve_identity(&mut self) -> Result<EntityId, WorldError> {
        if let Some(id) = self.free.pop() {
            return Ok(id);
        }
        let next = self.generations.len() as u32;
        if next >= self.capacity {
            return Err(WorldError::Capacity {
                capacity: self.capacity,
            });
        }
        self.generations.push(0);
        self.live.push(None);
        Ok(next)
    }

    /// Releases the identity now and queues the entity's removal.
    ///
    /// A visible entity stays visible (under its old handle) until the next
    /// structural pass. An entity that never became visible is dropped at once.
    pub fn destroy_entity(&mut self, handle: EntityHandle) -> Result<(), WorldError> {
        self.check_alive(handle)?;
        let slot = handle.id() as usize;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(handle.id());

        let pending_match = self
            .pending
            .get(&handle.id())
            .is_some_and(|entity| entity.handle() == handle);
        if pending_match {
            self.pending.remove(&handle.id());
        } else {
            self.changes.push(Change::Destroyed(handle));
        }
        trace!("🧹 Entity {} released", handle);
        Ok(())
    }

    /// Attaches `component`, returning any component of the same kind it replaced.
    pub fn add_component(&mut self, handle: EntityHandle, component: C) -> Result<Option<C>, WorldError> {
        let (entity, visible) = self.alive_entity_mut(handle)?;
        let previous = entity.insert(component);
        if visible {
            self.changes.push(Change::Changed(handle));
        }
        Ok(previous)
    }

    /// Detaches the component of `kind`, if present.
    pub fn remove_component(&mut self, handle: EntityHandle, kind: ComponentKind) -> Result<Option<C>, WorldError> {
        let (entity, visible) = self.alive_entity_mut(handle)?;
        let removed = entity.remove(kind);
        if visible && removed.is_some() {
            self.changes.push(Change::Changed(handle));
        }
        Ok(removed)
    }

    /// Looks up a component. Works for pending entities and for destroyed
    /// entities that are still visible this tick.
    pub fn get_component(&self, handle: EntityHandle, kind: ComponentKind) -> Option<&C> {
        self.entity(handle).and_then(|entity| entity.get(kind))
    }

    pub fn get_component_mut(&mut self, handle: EntityHandle, kind: ComponentKind) -> Option<&mut C> {
        self.entity_mut(handle).and_then(|entity| entity.get_mut(kind))
    }

    /// The entity's current mask.
    pub fn mask(&self, handle: EntityHandle) -> Option<ComponentMask> {
        self.entity(handle).map(Entity::mask)
    }

    /// True until the entity is destroyed.
    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.check_alive(handle).is_ok()
    }

    /// Number of entities visible to systems.
    pub fn visible_count(&self) -> usize {
        self.live.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of identities currently reserved.
    pub fn reserved_count(&self) -> usize {
        self.generations.len() - self.free.len()
    }

    /// Iterates over the entities visible to systems.
    pub fn visible(&self) -> impl Iterator<Item = &Entity<C>> {
        self.live.iter().filter_map(Option::as_ref)
    }

    /// Applies every buffered structural change in the order it was made.
    pub fn apply_changes(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::with_capacity(self.changes.len());
        for change in std::mem::take(&mut self.changes) {
            match change {
                Change::Created(handle) => {
                    let is_current = self
                        .pending
                        .get(&handle.id())
                        .is_some_and(|entity| entity.handle() == handle);
                    if !is_current {
                        continue;
                    }
                    if let Some(entity) = self.pending.remove(&handle.id()) {
                        let mask = entity.mask();
                        self.live[handle.id() as usize] = Some(entity);
                        transitions.push(Transition::Added(handle, mask));
                    }
                }
                Change::Destroyed(handle) => {
                    let slot = &mut self.live[handle.id() as usize];
                    if slot.as_ref().is_some_and(|entity| entity.handle() == handle) {
                        *slot = None;
                        transitions.push(Transition::Removed(handle));
                    }
                }
                Change::Changed(handle) => {
                    if let Some(entity) = self.live[handle.id() as usize]
                        .as_ref()
                        .filter(|entity| entity.handle() == handle)
                    {
                        transitions.push(Transition::Changed(handle, entity.mask()));
                    }
                }
            }
        }
        transitions
    }

    fn check_alive(&self, handle: EntityHandle) -> Result<(), WorldError> {
        match self.generations.get(handle.id() as usize) {
            Some(&generation) if generation == handle.generation() => Ok(()),
            _ => Err(WorldError::StaleEntity(handle)),
        }
    }

    fn alive_entity_mut(&mut self, handle: EntityHandle) -> Result<(&mut Entity<C>, bool), WorldError> {
        self.check_alive(handle)?;
        let id = handle.id();
        if let Some(entity) = self.live[id as usize].as_mut().filter(|e| e.handle() == handle) {
            return Ok((entity, true));
        }
        match self.pending.get_mut(&id).filter(|e| e.handle() == handle) {
            Some(entity) => Ok((entity, false)),
            None => Err(WorldError::StaleEntity(handle)),
        }
    }

    fn entity(&self, handle: EntityHandle) -> Option<&Entity<C>> {
        let id = handle.id();
        self.live
            .get(id as usize)
            .and_then(Option::as_ref)
            .filter(|entity| entity.handle() == handle)
            .or_else(|| self.pending.get(&id).filter(|entity| entity.handle() == handle))
    }

    fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity<C>> {
        let id = handle.id();
        let in_live = self
            .live
            .get(id as usize)
            .and_then(Option::as_ref)
            .is_some_and(|entity| entity.handle() == handle);
        if in_live {
            self.live[id as usize].as_mut()
        } else {
            self.pending.get_mut(&id).filter(|entity| entity.handle() == handle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::testing::{TestComponent, POSITION, TAG, VELOCITY};

    fn store(capacity: u32) -> EntityStore<TestComponent> {
        EntityStore::new(capacity)
    }

    #[test]
    fn created_entity_carries_exactly_its_initial_kinds() {
        let mut store = store(8);
        let builder = EntityBuilder::new()
            .with(TestComponent::Position(1.0, 2.0))
            .with(TestComponent::Tag("walker"));
        let expected = builder.mask();
        let handle = store.create_entity(builder).expect("capacity remains");

        assert_eq!(store.mask(handle), Some(expected));
        assert_eq!(expected, ComponentMask::of(&[POSITION, TAG]));
        assert!(store.get_component(handle, VELOCITY).is_none());
        assert!(matches!(
            store.get_component(handle, POSITION),
            Some(TestComponent::Position(x, y)) if *x == 1.0 && *y == 2.0
        ));
    }

    #[test]
    fn creation_fails_once_capacity_is_exhausted() {
        let mut store = store(2);
        store.create_entity(EntityBuilder::new()).expect("first fits");
        store.create_entity(EntityBuilder::new()).expect("second fits");

        let err = store.create_entity(EntityBuilder::new()).unwrap_err();
        assert!(matches!(err, WorldError::Capacity { capacity: 2 }));
    }

    #[test]
    fn released_identity_is_reused_before_growing() {
        let mut store = store(16);
        let handles: Vec<_> = (0..4)
            .map(|_| store.create_entity(EntityBuilder::new()).expect("capacity remains"))
            .collect();
        store.apply_changes();

        store.destroy_entity(handles[1]).expect("alive");
        let reused = store.create_entity(EntityBuilder::new()).expect("capacity remains");
        assert_eq!(reused.id(), handles[1].id());
        assert_ne!(reused, handles[1]);

        let grown = store.create_entity(EntityBuilder::new()).expect("capacity remains");
        assert_eq!(grown.id(), 4);
    }

    #[test]
    fn free_list_is_last_in_first_out() {
        let mut store = store(16);
        let handles: Vec<_> = (0..3)
            .map(|_| store.create_entity(EntityBuilder::new()).expect("capacity remains"))
            .collect();
        store.destroy_entity(handles[0]).expect("alive");
        store.destroy_entity(handles[2]).expect("alive");

        assert_eq!(store.create_entity(EntityBuilder::new()).unwrap().id(), 2);
        assert_eq!(store.create_entity(EntityBuilder::new()).unwrap().id(), 0);
    }

    #[test]
    fn destroyed_entity_stays_visible_until_changes_apply() {
        let mut store = store(4);
        let handle = store
            .create_entity(EntityBuilder::new().with(TestComponent::Velocity(1.0)))
            .expect("capacity remains");
        assert_eq!(store.visible_count(), 0);
        assert_eq!(store.apply_changes(), vec![Transition::Added(handle, VELOCITY.bit())]);

        store.destroy_entity(handle).expect("alive");
        assert!(!store.is_alive(handle));
        assert_eq!(store.visible_count(), 1);
        assert!(store.get_component(handle, VELOCITY).is_some());

        assert_eq!(store.apply_changes(), vec![Transition::Removed(handle)]);
        assert_eq!(store.visible_count(), 0);
        assert!(store.get_component(handle, VELOCITY).is_none());
    }

    #[test]
    fn reused_identity_does_not_disturb_the_outgoing_entity() {
        let mut store = store(1);
        let old = store
            .create_entity(EntityBuilder::new().with(TestComponent::Tag("old")))
            .expect("capacity remains");
        store.apply_changes();

        store.destroy_entity(old).expect("alive");
        let new = store
            .create_entity(EntityBuilder::new().with(TestComponent::Tag("new")))
            .expect("identity was released");
        assert_eq!(new.id(), old.id());
        assert!(matches!(store.get_component(old, TAG), Some(TestComponent::Tag("old"))));
        assert!(matches!(store.get_component(new, TAG), Some(TestComponent::Tag("new"))));

        assert_eq!(
            store.apply_changes(),
            vec![Transition::Removed(old), Transition::Added(new, TAG.bit())]
        );
        assert!(matches!(store.get_component(new, TAG), Some(TestComponent::Tag("new"))));
    }

    #[test]
    fn component_changes_update_mask_and_queue_transition() {
        let mut store = store(4);
        let handle = store
            .create_entity(EntityBuilder::new().with(TestComponent::Position(0.0, 0.0)))
            .expect("capacity remains");
        store.apply_changes();

        store.add_component(handle, TestComponent::Velocity(2.0)).expect("alive");
        assert_eq!(store.mask(handle), Some(ComponentMask::of(&[POSITION, VELOCITY])));

        let removed = store.remove_component(handle, POSITION).expect("alive");
        assert!(removed.is_some());
        assert_eq!(store.mask(handle), Some(VELOCITY.bit()));

        assert_eq!(
            store.apply_changes(),
            vec![
                Transition::Changed(handle, VELOCITY.bit()),
                Transition::Changed(handle, VELOCITY.bit()),
            ]
        );
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut store = store(4);
        let handle = store.create_entity(EntityBuilder::new()).expect("capacity remains");
        store.destroy_entity(handle).expect("alive");

        assert!(matches!(
            store.add_component(handle, TestComponent::Velocity(1.0)),
            Err(WorldError::StaleEntity(h)) if h == handle
        ));
        assert!(store.destroy_entity(handle).is_err());
        assert!(store.apply_changes().is_empty());
    }
}
