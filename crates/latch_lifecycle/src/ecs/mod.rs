//! Component lifecycle runtime.
//!
//! Components move through a fixed sequence of stages
//! (`PreAdd -> Adding -> ... -> Deleted`) driven by the [`World`]. Each
//! transition publishes a lifecycle event to the component type's own hook and
//! then to any subscribers on the [`EventBus`]. Handlers receive the world
//! mutably, so they may drive further transitions from inside a dispatch.

mod builder;
mod bus;
mod component;
mod defect;
mod entity;
mod error;
mod event;
mod lifecycle;
mod record;
mod registry;
mod stage;
pub mod storage;
mod world;

pub use builder::EntityBuilder;
pub use bus::{ComponentHandler, EventBus};
pub use component::{Component, ComponentIndex, ComponentInfo, Finalizer, HookFn, LifecycleHooks};
pub use defect::{Defect, DefectPolicy};
pub use entity::{Entity, EntityRecord};
pub use error::{BusError, HandlerError, HandlerResult, OwnershipError, RegistryError, WorldError};
pub use event::{ComponentEvent, EntityStarted, EntityTerminating, LifecycleKind};
pub use record::{ComponentHandle, ComponentRecord};
pub use registry::ComponentRegistry;
pub use stage::{EntityStage, LifeStage};
pub use world::World;

/// Spawn an entity into the world using builder-style component construction.
///
/// Expands to `world.spawn(builder)` and yields its `Result`.
#[macro_export]
macro_rules! spawn {
    ($world:expr $(, $component:expr)+ $(,)?) => {{
        let builder = {
            let mut builder = $crate::ecs::EntityBuilder::new();
            $(
                builder = builder.with($component);
            )+
            builder
        };
        $world.spawn(builder)
    }};
}
