//! Synchronous lifecycle and entity-broadcast dispatch table.
//!
//! The bus only stores subscribers; dispatching is done by the world, which
//! clones the relevant handler list before invoking anything. No borrow of
//! the table is held while a handler runs, so handlers are free to trigger
//! further transitions. Adding subscribers while a dispatch is in flight is
//! rejected.

use crate::ecs::{
    BusError, ComponentEvent, ComponentIndex, Entity, HandlerResult, LifecycleKind, World,
};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub type ComponentHandler =
    Arc<dyn Fn(&mut World, &ComponentEvent) -> HandlerResult + Send + Sync>;

pub(crate) type BroadcastHandler =
    Arc<dyn Fn(&mut World, Entity, &dyn Any) -> HandlerResult + Send + Sync>;

/// Subscriber table owned by a single world.
#[derive(Default)]
pub struct EventBus {
    component: HashMap<(LifecycleKind, ComponentIndex), Vec<ComponentHandler>>,
    broadcast: HashMap<TypeId, Vec<BroadcastHandler>>,
    dispatch_depth: Arc<AtomicU32>,
}

/// Marks a dispatch as in flight until dropped, including on unwind.
pub(crate) struct DispatchGuard {
    depth: Arc<AtomicU32>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind` events targeting components in `index`.
    /// Handlers run in registration order, after the component's own hook.
    pub fn subscribe<F>(
        &mut self,
        kind: LifecycleKind,
        index: ComponentIndex,
        handler: F,
    ) -> Result<(), BusError>
    where
        F: Fn(&mut World, &ComponentEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.ensure_idle()?;
        self.component
            .entry((kind, index))
            .or_default()
            .push(Arc::new(handler));
        tracing::debug!(event = %kind, component = %index, "subscribed lifecycle handler");
        Ok(())
    }

    /// Register a handler for entity-scoped broadcasts of type `E`.
    pub fn subscribe_broadcast<E, F>(&mut self, handler: F) -> Result<(), BusError>
    where
        E: 'static,
        F: Fn(&mut World, Entity, &E) -> HandlerResult + Send + Sync + 'static,
    {
        self.ensure_idle()?;
        let erased: BroadcastHandler = Arc::new(
            move |world: &mut World, entity: Entity, event: &dyn Any| -> HandlerResult {
                match event.downcast_ref::<E>() {
                    Some(event) => handler(world, entity, event),
                    None => Ok(()),
                }
            },
        );
        self.broadcast
            .entry(TypeId::of::<E>())
            .or_default()
            .push(erased);
        tracing::debug!(event = std::any::type_name::<E>(), "subscribed broadcast handler");
        Ok(())
    }

    pub fn subscriber_count(&self, kind: LifecycleKind, index: ComponentIndex) -> usize {
        self.component.get(&(kind, index)).map_or(0, Vec::len)
    }

    pub fn broadcast_subscriber_count<E: 'static>(&self) -> usize {
        self.broadcast.get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }

    /// Whether a publish is currently on the call stack.
    pub fn is_dispatching(&self) -> bool {
        self.dispatch_depth.load(Ordering::Acquire) > 0
    }

    pub(crate) fn component_handlers(
        &self,
        kind: LifecycleKind,
        index: ComponentIndex,
    ) -> Vec<ComponentHandler> {
        self.component
            .get(&(kind, index))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn broadcast_handlers(&self, event: TypeId) -> Vec<BroadcastHandler> {
        self.broadcast.get(&event).cloned().unwrap_or_default()
    }

    pub(crate) fn enter_dispatch(&self) -> DispatchGuard {
        self.dispatch_depth.fetch_add(1, Ordering::AcqRel);
        DispatchGuard {
            depth: Arc::clone(&self.dispatch_depth),
        }
    }

    fn ensure_idle(&self) -> Result<(), BusError> {
        if self.is_dispatching() {
            return Err(BusError::SubscribeDuringDispatch);
        }
        Ok(())
    }
}
