//! Component type registry.

use crate::ecs::{Component, ComponentIndex, ComponentInfo, RegistryError};
use std::any::TypeId;
use std::collections::HashMap;

/// Dense, append-only table mapping component types to slots.
///
/// Slots are handed out in registration order and never reused. Once
/// `freeze` is called the table is read-only; already-registered types still
/// resolve.
#[derive(Default)]
pub struct ComponentRegistry {
    components: Vec<ComponentInfo>,
    type_lookup: HashMap<TypeId, ComponentIndex>,
    name_lookup: HashMap<&'static str, ComponentIndex>,
    frozen: bool,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, or return its existing slot.
    pub fn register<T: Component>(&mut self) -> Result<ComponentIndex, RegistryError> {
        if let Some(index) = self.resolve::<T>() {
            return Ok(index);
        }
        if self.frozen {
            return Err(RegistryError::Frozen { name: T::NAME });
        }
        if let Some(existing) = self.name_lookup.get(T::NAME) {
            return Err(RegistryError::DuplicateName {
                name: T::NAME,
                existing: *existing,
            });
        }

        let index = ComponentIndex::new(self.components.len() as u32);
        self.components.push(ComponentInfo::of::<T>(index));
        self.type_lookup.insert(TypeId::of::<T>(), index);
        self.name_lookup.insert(T::NAME, index);
        tracing::debug!(component = T::NAME, slot = %index, "registered component");
        Ok(index)
    }

    #[inline]
    pub fn resolve<T: Component>(&self) -> Option<ComponentIndex> {
        self.resolve_type(TypeId::of::<T>())
    }

    #[inline]
    pub fn resolve_type(&self, type_id: TypeId) -> Option<ComponentIndex> {
        self.type_lookup.get(&type_id).copied()
    }

    /// Inverse of [`resolve`](Self::resolve).
    #[inline]
    pub fn lookup(&self, index: ComponentIndex) -> Option<&ComponentInfo> {
        self.components.get(index.as_usize())
    }

    /// Resolve by persistent name rather than slot number.
    pub fn index_of_name(&self, name: &str) -> Option<ComponentIndex> {
        self.name_lookup.get(name).copied()
    }

    pub fn name_of(&self, index: ComponentIndex) -> &'static str {
        self.lookup(index).map_or("<unregistered>", |info| info.name)
    }

    /// Make the table read-only.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.components.iter()
    }
}
