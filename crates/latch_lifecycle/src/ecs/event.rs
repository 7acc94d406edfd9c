use crate::ecs::{ComponentHandle, ComponentIndex, Entity};
use std::fmt;

/// The five component lifecycle signals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleKind {
    Add,
    Init,
    Startup,
    Shutdown,
    Remove,
}

impl LifecycleKind {
    pub const ALL: [LifecycleKind; 5] = [
        LifecycleKind::Add,
        LifecycleKind::Init,
        LifecycleKind::Startup,
        LifecycleKind::Shutdown,
        LifecycleKind::Remove,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LifecycleKind::Add => "add",
            LifecycleKind::Init => "init",
            LifecycleKind::Startup => "startup",
            LifecycleKind::Shutdown => "shutdown",
            LifecycleKind::Remove => "remove",
        }
    }

    pub(crate) fn counter(self) -> &'static str {
        match self {
            LifecycleKind::Add => "lifecycle.add",
            LifecycleKind::Init => "lifecycle.init",
            LifecycleKind::Startup => "lifecycle.startup",
            LifecycleKind::Shutdown => "lifecycle.shutdown",
            LifecycleKind::Remove => "lifecycle.remove",
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component-scoped lifecycle signal. Carries no payload beyond its target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ComponentEvent {
    pub kind: LifecycleKind,
    pub handle: ComponentHandle,
}

impl ComponentEvent {
    pub fn new(kind: LifecycleKind, handle: ComponentHandle) -> Self {
        Self { kind, handle }
    }

    #[inline]
    pub fn entity(&self) -> Entity {
        self.handle.owner()
    }

    #[inline]
    pub fn index(&self) -> ComponentIndex {
        self.handle.index()
    }
}

/// Broadcast after an entity's startup phase has completed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntityStarted;

/// Broadcast before an entity's components are torn down.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntityTerminating;
