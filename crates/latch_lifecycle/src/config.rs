//! Lifecycle configuration

use crate::ecs::DefectPolicy;
use serde::{Deserialize, Serialize};

/// Knobs the host can set from its settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Behaviour on contract violations. Defaults to fail-fast in debug
    /// builds and fail-forward in release builds.
    pub defect_policy: DefectPolicy,
    /// Freeze the component registry once the host has registered its types.
    pub freeze_registry: bool,
}
