// component.rs - Component trait, lifecycle hooks and the dense type index
//
// Components are routed by a dense `ComponentIndex` assigned at registration,
// never by reflection. Hooks are plain function pointers captured once per type.

use crate::ecs::{ComponentEvent, HandlerResult, LifecycleKind, World};
use std::any::TypeId;
use std::fmt;

/// Dense slot assigned to each registered component type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentIndex(u32);

impl ComponentIndex {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw index backing this slot.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signature of a component type's own lifecycle hook.
pub type HookFn = fn(&mut World, &ComponentEvent) -> HandlerResult;

/// Trait for anything that can be attached to an entity.
///
/// Every hook receives the whole world, so a component may inspect its
/// siblings or drive further transitions (including removing itself) from
/// inside its own handler. Hooks may read but never write the lifecycle
/// stage; the world is the only writer.
///
/// # Example
/// ```ignore
/// struct Timer { remaining: u32 }
///
/// impl Component for Timer {
///     const NAME: &'static str = "Timer";
///
///     fn on_startup(world: &mut World, event: &ComponentEvent) -> HandlerResult {
///         if world.get::<Timer>(event.entity()).map_or(false, |t| t.remaining == 0) {
///             world.remove::<Timer>(event.entity())?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Component: 'static + Sized + Send + Sync {
    /// Unique human-readable name, also the persistence key for this type.
    const NAME: &'static str;

    fn on_add(_world: &mut World, _event: &ComponentEvent) -> HandlerResult {
        Ok(())
    }

    fn on_init(_world: &mut World, _event: &ComponentEvent) -> HandlerResult {
        Ok(())
    }

    fn on_startup(_world: &mut World, _event: &ComponentEvent) -> HandlerResult {
        Ok(())
    }

    fn on_shutdown(_world: &mut World, _event: &ComponentEvent) -> HandlerResult {
        Ok(())
    }

    fn on_remove(_world: &mut World, _event: &ComponentEvent) -> HandlerResult {
        Ok(())
    }

    /// Final cleanup, run after the `Remove` event has been delivered.
    ///
    /// Overrides must call [`Finalizer::mark_deleted`]; forgetting to is
    /// reported as a defect.
    fn finalize(&mut self, finalizer: &mut Finalizer) {
        finalizer.mark_deleted();
    }
}

/// Token handed to [`Component::finalize`].
#[derive(Debug, Default)]
pub struct Finalizer {
    marked: bool,
}

impl Finalizer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Confirm that the component has released everything it owns.
    pub fn mark_deleted(&mut self) {
        self.marked = true;
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.marked
    }
}

/// A component type's own handlers, one per lifecycle event.
#[derive(Copy, Clone)]
pub struct LifecycleHooks {
    add: HookFn,
    init: HookFn,
    startup: HookFn,
    shutdown: HookFn,
    remove: HookFn,
}

impl LifecycleHooks {
    pub fn of<T: Component>() -> Self {
        Self {
            add: T::on_add,
            init: T::on_init,
            startup: T::on_startup,
            shutdown: T::on_shutdown,
            remove: T::on_remove,
        }
    }

    #[inline]
    pub fn get(&self, kind: LifecycleKind) -> HookFn {
        match kind {
            LifecycleKind::Add => self.add,
            LifecycleKind::Init => self.init,
            LifecycleKind::Startup => self.startup,
            LifecycleKind::Shutdown => self.shutdown,
            LifecycleKind::Remove => self.remove,
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks").finish_non_exhaustive()
    }
}

/// Metadata describing a registered component type.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    pub index: ComponentIndex,
    pub name: &'static str,
    pub type_id: TypeId,
    pub hooks: LifecycleHooks,
}

impl ComponentInfo {
    pub(crate) fn of<T: Component>(index: ComponentIndex) -> Self {
        Self {
            index,
            name: T::NAME,
            type_id: TypeId::of::<T>(),
            hooks: LifecycleHooks::of::<T>(),
        }
    }
}

/// Helper macro to implement [`Component`] with no-op hooks.
///
/// # Example
/// ```ignore
/// struct Position { x: f32, y: f32 }
///
/// define_component!(Position, "Position");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $name:expr) => {
        impl $crate::ecs::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
}
