//! Entity identity and per-entity component storage.

use super::component::{Component, ComponentKind, ComponentMask, MAX_COMPONENT_KINDS};
use std::fmt;

/// Raw identity slot of an entity.
pub type EntityId = u32;

/// Handle to an entity: identity slot plus the generation it was issued under.
///
/// Identities are recycled, so a handle held past the entity's destruction is
/// told apart from the new occupant of the same slot by its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    id: EntityId,
    generation: u32,
}

impl EntityHandle {
    /// Reassembles a handle from its parts, e.g. after crossing the wire.
    pub const fn new(id: EntityId, generation: u32) -> Self {
        Self { id, generation }
    }

    /// Identity slot.
    #[inline]
    pub const fn id(self) -> EntityId {
        self.id
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.id, self.generation)
    }
}

/// An entity record: handle, kind mask and one storage slot per kind.
///
/// The mask and the slots only change together, so bit *i* of the mask is set
/// exactly when slot *i* holds a component.
pub struct Entity<C> {
    handle: EntityHandle,
    mask: ComponentMask,
    slots: Box<[Option<C>]>,
}

impl<C: Component> Entity<C> {
    pub(crate) fn new(handle: EntityHandle) -> Self {
        let slots = (0..MAX_COMPONENT_KINDS).map(|_| None).collect::<Vec<_>>();
        Self {
            handle,
            mask: ComponentMask::EMPTY,
            slots: slots.into_boxed_slice(),
        }
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// Kinds currently held.
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&C> {
        self.slots[kind.index()].as_ref()
    }

    pub fn get_mut(&mut self, kind: ComponentKind) -> Option<&mut C> {
        self.slots[kind.index()].as_mut()
    }

    /// Stores `component` under its kind, returning the one it replaced.
    pub(crate) fn insert(&mut self, component: C) -> Option<C> {
        let kind = component.kind();
        self.mask = self.mask.with(kind);
        self.slots[kind.index()].replace(component)
    }

    pub(crate) fn remove(&mut self, kind: ComponentKind) -> Option<C> {
        self.mask = self.mask.without(kind);
        self.slots[kind.index()].take()
    }
}

impl<C> fmt::Debug for Entity<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("handle", &self.handle)
            .field("mask", &self.mask)
            .finish()
    }
}

/// Initial component set for a new entity.
///
/// A later component of the same kind replaces an earlier one.
///
/// ```rust,ignore
/// let handle = world.create_entity(
///     EntityBuilder::new()
///         .with(GameComponent::Transform(Transform::default()))
///         .with(GameComponent::Player(link)),
/// )?;
/// ```
pub struct EntityBuilder<C> {
    components: Vec<C>,
}

impl<C: Component> EntityBuilder<C> {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn with(mut self, component: C) -> Self {
        self.components.push(component);
        self
    }

    /// Mask the built entity will carry.
    pub fn mask(&self) -> ComponentMask {
        self.components
            .iter()
            .fold(ComponentMask::EMPTY, |mask, c| mask.with(c.kind()))
    }

    pub(crate) fn build(self, handle: EntityHandle) -> Entity<C> {
        let mut entity = Entity::new(handle);
        for component in self.components {
            entity.insert(component);
        }
        entity
    }
}

impl<C: Component> Default for EntityBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
