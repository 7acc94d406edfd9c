use crate::ecs::{Component, ComponentHandle, Entity, World, WorldError};
use std::any::TypeId;

/// A typed component waiting to be attached by [`World::spawn`].
pub(crate) trait PendingComponent: Send {
    fn name(&self) -> &'static str;

    fn component_type(&self) -> TypeId;

    fn attach(
        self: Box<Self>,
        world: &mut World,
        entity: Entity,
    ) -> Result<ComponentHandle, WorldError>;
}

struct Pending<T>(T);

impl<T: Component> PendingComponent for Pending<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn attach(
        self: Box<Self>,
        world: &mut World,
        entity: Entity,
    ) -> Result<ComponentHandle, WorldError> {
        world.attach_component(entity, self.0)
    }
}

/// Ordered list of components for a new entity.
///
/// Components are attached in the order they were added. Adding a second
/// value of the same type replaces the first in place.
#[derive(Default)]
pub struct EntityBuilder {
    components: Vec<Box<dyn PendingComponent>>,
}

impl EntityBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component by value.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        let pending: Box<dyn PendingComponent> = Box::new(Pending(value));
        match self
            .components
            .iter_mut()
            .find(|existing| existing.component_type() == TypeId::of::<T>())
        {
            Some(existing) => *existing = pending,
            None => self.components.push(pending),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component names in attach order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.components.iter().map(|pending| pending.name())
    }

    pub(crate) fn into_components(self) -> Vec<Box<dyn PendingComponent>> {
        self.components
    }
}
