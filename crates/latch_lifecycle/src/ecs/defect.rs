//! Defect reporting.
//!
//! A defect is a broken lifecycle contract detected at runtime. Defects are
//! not errors handed back to the caller: they are logged, kept in the world's
//! defect log and, under [`DefectPolicy::FailFast`], turned into a panic.

use crate::ecs::{ComponentHandle, Entity, LifeStage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when the stage machine detects a contract violation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectPolicy {
    /// Panic after logging. Default in debug builds.
    FailFast,
    /// Log and keep going. Default in release builds.
    FailForward,
}

impl Default for DefectPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DefectPolicy::FailFast
        } else {
            DefectPolicy::FailForward
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Defect {
    #[error("{operation} on {component} {handle}: illegal transition {from} -> {to}")]
    Sequencing {
        handle: ComponentHandle,
        component: &'static str,
        operation: &'static str,
        from: LifeStage,
        to: LifeStage,
    },

    #[error("handler #{position} for '{event}' on entity {entity} failed: {message}")]
    HandlerFailed {
        entity: Entity,
        event: &'static str,
        position: usize,
        message: String,
    },

    #[error("{component} {handle} did not mark itself deleted in finalize")]
    FinalizeSkipped {
        handle: ComponentHandle,
        component: &'static str,
    },
}

impl Defect {
    /// Handler failures are always isolated; every other defect is fatal
    /// under `FailFast`.
    pub fn is_fatal(&self, policy: DefectPolicy) -> bool {
        policy == DefectPolicy::FailFast && !matches!(self, Defect::HandlerFailed { .. })
    }
}
