//! Per-type component columns.
//!
//! Each registered component type gets one dense column. Rows are reused
//! through a free list; every release bumps the row's generation so a stale
//! `(row, generation)` pair never resolves to the next occupant. Entities
//! only hold those indices, never the values.

use crate::ecs::{Component, Finalizer};
use std::any::Any;

struct Row<T> {
    generation: u32,
    value: Option<T>,
}

/// Dense storage for every live instance of one component type.
pub struct ComponentColumn<T> {
    rows: Vec<Row<T>>,
    free: Vec<u32>,
}

impl<T> ComponentColumn<T> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store `value`, returning its `(row, generation)`.
    pub fn alloc(&mut self, value: T) -> (u32, u32) {
        if let Some(row) = self.free.pop() {
            let slot = &mut self.rows[row as usize];
            debug_assert!(slot.value.is_none(), "free row {row} still occupied");
            slot.value = Some(value);
            (row, slot.generation)
        } else {
            let row = self.rows.len() as u32;
            self.rows.push(Row {
                generation: 0,
                value: Some(value),
            });
            (row, 0)
        }
    }

    #[inline]
    pub fn get(&self, row: u32, generation: u32) -> Option<&T> {
        self.rows
            .get(row as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, row: u32, generation: u32) -> Option<&mut T> {
        self.rows
            .get_mut(row as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Take the value out and return the row to the pool.
    pub fn release(&mut self, row: u32, generation: u32) -> Option<T> {
        let slot = self.rows.get_mut(row as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(row);
        Some(value)
    }

    /// Number of occupied rows.
    pub fn len(&self) -> usize {
        self.rows.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ComponentColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a column, used by the world where the concrete
/// component type is only known through its `ComponentIndex`.
pub(crate) trait ErasedColumn: Any {
    /// Run the component's finalize hook. Returns `false` if the row is gone.
    fn finalize(&mut self, row: u32, generation: u32, finalizer: &mut Finalizer) -> bool;

    /// Drop the value and recycle the row.
    fn release(&mut self, row: u32, generation: u32) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for ComponentColumn<T> {
    fn finalize(&mut self, row: u32, generation: u32, finalizer: &mut Finalizer) -> bool {
        match self.get_mut(row, generation) {
            Some(value) => {
                value.finalize(finalizer);
                true
            }
            None => false,
        }
    }

    fn release(&mut self, row: u32, generation: u32) -> bool {
        ComponentColumn::release(self, row, generation).is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
