use crate::ecs::{ComponentHandle, ComponentIndex, Entity, LifeStage};
use std::fmt;
use thiserror::Error;

/// Violations of the one-live-component-per-slot rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    #[error("entity {entity} already holds a live component in slot {component} (stage {stage})")]
    SlotOccupied {
        entity: Entity,
        component: ComponentIndex,
        stage: LifeStage,
    },

    #[error("cannot detach slot {component} from entity {entity}: stage is {stage}, not Deleted")]
    NotDeleted {
        entity: Entity,
        component: ComponentIndex,
        stage: LifeStage,
    },

    #[error("entity {entity} has nothing in slot {component}")]
    Vacant {
        entity: Entity,
        component: ComponentIndex,
    },
}

/// Errors that can occur while registering a component type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("component name '{name}' is already registered to slot {existing}")]
    DuplicateName {
        name: &'static str,
        existing: ComponentIndex,
    },

    #[error("registry is frozen; cannot register '{name}'")]
    Frozen { name: &'static str },

    #[error("component '{name}' is not registered")]
    Unregistered { name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("cannot subscribe while an event is being dispatched")]
    SubscribeDuringDispatch,
}

/// Errors returned by fallible [`World`](crate::ecs::World) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("entity {0} does not exist")]
    EntityNotFound(Entity),

    #[error("entity {0} is terminating")]
    EntityTerminating(Entity),

    #[error("entity {entity} has no component in slot {component}")]
    ComponentNotFound {
        entity: Entity,
        component: ComponentIndex,
    },

    #[error("component handle {0} is stale")]
    StaleHandle(ComponentHandle),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Failure reported by a lifecycle or broadcast handler.
///
/// Handler failures never escape the publish call; the world records them
/// as defects and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(error: &dyn std::error::Error) -> Self {
        Self::new(error.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<WorldError> for HandlerError {
    fn from(error: WorldError) -> Self {
        Self::from_error(&error)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

pub type HandlerResult = Result<(), HandlerError>;
