//! Entity handle with generational index, and the per-entity component set
//!
//! Entities are lightweight handles (8 bytes) that reference an `EntityRecord`
//! in the world. The generation counter prevents use-after-free bugs.

use crate::ecs::{ComponentIndex, ComponentRecord, EntityStage, LifeStage, OwnershipError};
use crate::time::Tick;
use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: Position in the world's entity table
/// - Generation: Incremented on entity deletion (prevents use-after-free)
///
/// Example:
/// ```ignore
/// let entity = world.spawn_entity();
/// world.delete_entity(entity)?;
/// // entity handle is now invalid (generation mismatch)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Serialize to 64-bit integer (for networking/save files)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// An entity and the components it owns, keyed by component slot.
///
/// The one-live-component-per-slot rule is enforced here.
#[derive(Clone, Debug)]
pub struct EntityRecord {
    entity: Entity,
    pub(crate) stage: EntityStage,
    creation_tick: Tick,
    components: BTreeMap<ComponentIndex, ComponentRecord>,
}

impl EntityRecord {
    pub(crate) fn new(entity: Entity, creation_tick: Tick) -> Self {
        Self {
            entity,
            stage: EntityStage::PreInit,
            creation_tick,
            components: BTreeMap::new(),
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn stage(&self) -> EntityStage {
        self.stage
    }

    pub fn creation_tick(&self) -> Tick {
        self.creation_tick
    }

    pub fn get(&self, index: ComponentIndex) -> Option<&ComponentRecord> {
        self.components.get(&index)
    }

    pub(crate) fn get_mut(&mut self, index: ComponentIndex) -> Option<&mut ComponentRecord> {
        self.components.get_mut(&index)
    }

    /// Place `record` into its slot.
    ///
    /// Fails if the slot holds a component that is not yet `Deleted`.
    /// A `Deleted` occupant is displaced and handed back so the caller can
    /// release its storage.
    pub fn attach(
        &mut self,
        record: ComponentRecord,
    ) -> Result<Option<ComponentRecord>, OwnershipError> {
        debug_assert_eq!(record.owner(), self.entity, "record attached to foreign entity");
        let index = record.index();
        if let Some(existing) = self.components.get(&index) {
            if existing.stage != LifeStage::Deleted {
                return Err(OwnershipError::SlotOccupied {
                    entity: self.entity,
                    component: index,
                    stage: existing.stage,
                });
            }
        }
        Ok(self.components.insert(index, record))
    }

    /// Remove a `Deleted` component from its slot.
    pub fn detach(&mut self, index: ComponentIndex) -> Result<ComponentRecord, OwnershipError> {
        match self.components.entry(index) {
            Entry::Vacant(_) => Err(OwnershipError::Vacant {
                entity: self.entity,
                component: index,
            }),
            Entry::Occupied(existing) if existing.get().stage != LifeStage::Deleted => {
                Err(OwnershipError::NotDeleted {
                    entity: self.entity,
                    component: index,
                    stage: existing.get().stage,
                })
            }
            Entry::Occupied(existing) => Ok(existing.remove()),
        }
    }

    /// Components in slot order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentRecord> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

struct EntitySlot {
    generation: u32,
    record: Option<EntityRecord>,
}

/// Generational table of entity records.
#[derive(Default)]
pub(crate) struct EntityTable {
    slots: Vec<EntitySlot>,
    free: Vec<u32>,
}

impl EntityTable {
    pub fn spawn(&mut self, tick: Tick) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let entity = Entity::new(index, slot.generation);
            slot.record = Some(EntityRecord::new(entity, tick));
            entity
        } else {
            let index = self.slots.len() as u32;
            let entity = Entity::new(index, 0);
            self.slots.push(EntitySlot {
                generation: 0,
                record: Some(EntityRecord::new(entity, tick)),
            });
            entity
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&EntityRecord> {
        self.slots
            .get(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    /// Drop the record and invalidate every outstanding handle to it.
    pub fn release(&mut self, entity: Entity) -> Option<EntityRecord> {
        let slot = self.slots.get_mut(entity.index as usize)?;
        if slot.generation != entity.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.index);
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
