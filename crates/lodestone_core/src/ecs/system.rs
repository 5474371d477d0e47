//! Systems: a run policy, a processor, and the entities subscribed to them.

use super::component::{Component, ComponentMask};
use super::entity::EntityHandle;
use super::store::EntityStore;
use crate::error::WorldError;
use std::fmt;
use std::time::Duration;

/// Identifier returned by [`crate::ecs::World::add_system`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub(crate) u32);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// Decides, once per tick, whether a system runs.
pub trait Policy: Send {
    /// Called with the tick's elapsed time. An error aborts the tick.
    fn should_run(&mut self, delta: Duration) -> Result<bool, WorldError>;
}

/// Runs every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPolicy;

impl Policy for AlwaysPolicy {
    fn should_run(&mut self, _delta: Duration) -> Result<bool, WorldError> {
        Ok(true)
    }
}

/// Runs once accumulated tick time reaches `rate`, then starts over from zero.
///
/// Overshoot is discarded and a single call never fires twice, so a long stall
/// yields one run rather than a burst of catch-up runs.
#[derive(Debug, Clone, Copy)]
pub struct IntervalPolicy {
    rate: Duration,
    accumulated: Duration,
}

impl IntervalPolicy {
    pub fn new(rate: Duration) -> Self {
        Self {
            rate,
            accumulated: Duration::ZERO,
        }
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    /// Time accumulated since the last run.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }
}

impl Policy for IntervalPolicy {
    fn should_run(&mut self, delta: Duration) -> Result<bool, WorldError> {
        self.accumulated = self.accumulated.saturating_add(delta);
        if self.accumulated >= self.rate {
            self.accumulated = Duration::ZERO;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Per-tick logic of a system.
///
/// `entities` is the system's subscription list, in subscription order.
/// Structural changes made through `store` become visible at the next tick.
pub trait Processor<C: Component>: Send {
    fn process(
        &mut self,
        entities: &[EntityHandle],
        store: &mut EntityStore<C>,
        delta: Duration,
    ) -> Result<(), WorldError>;
}

/// A registered unit of per-tick work.
pub struct System<C: Component> {
    name: &'static str,
    interest: ComponentMask,
    policy: Box<dyn Policy>,
    processor: Box<dyn Processor<C>>,
    pub(crate) entities: Vec<EntityHandle>,
}

impl<C: Component> System<C> {
    /// Creates a system interested in any entity sharing a kind with `interest`.
    pub fn new(
        name: &'static str,
        interest: ComponentMask,
        policy: impl Policy + 'static,
        processor: impl Processor<C> + 'static,
    ) -> Self {
        Self {
            name,
            interest,
            policy: Box::new(policy),
            processor: Box::new(processor),
            entities: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interest(&self) -> ComponentMask {
        self.interest
    }

    /// Entities currently subscribed.
    pub fn entities(&self) -> &[EntityHandle] {
        &self.entities
    }

    pub(crate) fn is_interested(&self, mask: ComponentMask) -> bool {
        self.interest.intersects(mask)
    }

    /// Adds or drops `handle` so that membership matches `mask`.
    pub(crate) fn resubscribe(&mut self, handle: EntityHandle, mask: ComponentMask) {
        let position = self.entities.iter().position(|h| *h == handle);
        match (self.is_interested(mask), position) {
            (true, None) => self.entities.push(handle),
            (false, Some(index)) => {
                self.entities.remove(index);
            }
            _ => {}
        }
    }

    pub(crate) fn unsubscribe(&mut self, handle: EntityHandle) {
        self.entities.retain(|h| *h != handle);
    }

    pub(crate) fn run(&mut self, store: &mut EntityStore<C>, delta: Duration) -> Result<bool, WorldError> {
        if !self.policy.should_run(delta)? {
            return Ok(false);
        }
        self.processor.process(&self.entities, store, delta)?;
        Ok(true)
    }
}

impl<C: Component> fmt::Debug for System<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("interest", &self.interest)
            .field("entities", &self.entities.len())
            .finish()
    }
}

/// Any `FnMut` with the processor signature is a processor.
impl<C, F> Processor<C> for F
where
    C: Component,
    F: FnMut(&[EntityHandle], &mut EntityStore<C>, Duration) -> Result<(), WorldError> + Send,
{
    fn process(
        &mut self,
        entities: &[EntityHandle],
        store: &mut EntityStore<C>,
        delta: Duration,
    ) -> Result<(), WorldError> {
        self(entities, store, delta)
    }
}
