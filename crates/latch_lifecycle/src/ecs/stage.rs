//! Component and entity lifecycle stages.
//!
//! `LifeStage` is a closed, totally ordered enumeration. Every write the
//! world performs on a component's stage goes through
//! [`LifeStage::can_transition`], which is checked in every build
//! configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a single component instance.
///
/// The declaration order is the lifecycle order; `Ord` follows it.
/// The `-ing` variants are transitional: they are only observable while the
/// corresponding event is being dispatched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifeStage {
    PreAdd,
    Adding,
    Added,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    Removing,
    Deleted,
}

impl LifeStage {
    /// Transition table for the component state machine.
    pub fn can_transition(self, to: LifeStage) -> bool {
        use LifeStage::*;
        match (self, to) {
            (PreAdd, Adding)
            | (Adding, Added)
            | (Added, Initializing)
            | (Initializing, Initialized)
            | (Initialized, Starting)
            | (Starting, Running)
            | (Running, Stopping)
            | (Starting, Stopping)
            | (Stopping, Stopped)
            | (Removing, Deleted) => true,
            // Shutdown of a component that never started.
            (Adding | Added | Initializing | Initialized, Stopped) => true,
            // Removal is legal from anywhere after PreAdd, including from
            // inside another stage's handlers, but never twice.
            (from, Removing) => from != PreAdd && from < Removing,
            _ => false,
        }
    }

    /// True for the stages only visible during dispatch.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            LifeStage::Adding
                | LifeStage::Initializing
                | LifeStage::Starting
                | LifeStage::Stopping
                | LifeStage::Removing
        )
    }

    /// Component is on its way out or gone.
    #[inline]
    pub fn is_deleted(self) -> bool {
        self >= LifeStage::Removing
    }
}

impl fmt::Display for LifeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle stage of an entity as a whole.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityStage {
    /// Spawned, components may be attached but none has started.
    PreInit,
    /// Every attached component has completed `Init`.
    Initialized,
    /// Startup phase has run; new components start immediately.
    Running,
    /// Being deleted; no further attaches.
    Terminating,
    Deleted,
}
