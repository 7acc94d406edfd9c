//! Component handles and per-component lifecycle records.

use crate::ecs::{ComponentIndex, Entity, LifeStage};
use crate::time::Tick;
use std::fmt;

/// Stable reference to one component instance.
///
/// Carries the owning entity, the type slot and the storage row. A handle
/// outlives its component harmlessly: once the component is detached the
/// row generation moves on and the handle no longer resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    owner: Entity,
    index: ComponentIndex,
    row: u32,
    generation: u32,
}

impl ComponentHandle {
    pub(crate) const fn new(owner: Entity, index: ComponentIndex, row: u32, generation: u32) -> Self {
        Self {
            owner,
            index,
            row,
            generation,
        }
    }

    #[inline]
    pub fn owner(&self) -> Entity {
        self.owner
    }

    #[inline]
    pub fn index(&self) -> ComponentIndex {
        self.index
    }

    #[inline]
    pub(crate) fn row(&self) -> u32 {
        self.row
    }

    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}v{}", self.owner, self.index, self.row, self.generation)
    }
}

/// Lifecycle bookkeeping for one attached component.
///
/// Readable by anyone; only the world writes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentRecord {
    pub(crate) handle: ComponentHandle,
    pub(crate) stage: LifeStage,
    pub(crate) creation_tick: Tick,
    pub(crate) last_modified_tick: Tick,
}

impl ComponentRecord {
    pub(crate) fn new(handle: ComponentHandle) -> Self {
        Self {
            handle,
            stage: LifeStage::PreAdd,
            creation_tick: Tick::ZERO,
            last_modified_tick: Tick::ZERO,
        }
    }

    #[inline]
    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    #[inline]
    pub fn owner(&self) -> Entity {
        self.handle.owner
    }

    #[inline]
    pub fn index(&self) -> ComponentIndex {
        self.handle.index
    }

    #[inline]
    pub fn stage(&self) -> LifeStage {
        self.stage
    }

    #[inline]
    pub fn creation_tick(&self) -> Tick {
        self.creation_tick
    }

    #[inline]
    pub fn last_modified_tick(&self) -> Tick {
        self.last_modified_tick
    }

    /// Removing or already removed.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.stage.is_deleted()
    }
}
