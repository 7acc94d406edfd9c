// world.rs - Lifecycle coordinator: entity ownership, component storage, dispatch
//
// The world is the single writer of every component's stage. The five
// transition operations live in `lifecycle.rs`; this file holds ownership,
// lookup and the engine-facing attach/remove/spawn/delete operations.

use crate::config::LifecycleSettings;
use crate::ecs::entity::EntityTable;
use crate::ecs::storage::{ComponentColumn, ErasedColumn};
use crate::ecs::{
    Component, ComponentEvent, ComponentHandle, ComponentIndex, ComponentRecord,
    ComponentRegistry, Defect, DefectPolicy, Entity, EntityBuilder, EntityRecord, EntityStage,
    EntityStarted, EntityTerminating, EventBus, HandlerError, HandlerResult, LifeStage,
    LifecycleKind, RegistryError, WorldError,
};
use crate::time::{SimulationClock, Tick, TickSource};
use latch_metrics::Counter;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Owns every entity and component and drives them through their lifecycle.
///
/// Handlers are called with `&mut World`, so any operation here may be
/// re-entered from inside a dispatch on the same thread.
pub struct World {
    pub(crate) registry: ComponentRegistry,
    pub(crate) bus: EventBus,
    clock: Arc<dyn TickSource>,
    pub(crate) policy: DefectPolicy,
    entities: EntityTable,
    pub(crate) columns: Vec<Option<Box<dyn ErasedColumn>>>,
    defects: Vec<Defect>,
    pub(crate) counters: Counter,
}

impl World {
    /// Create a world around an injected registry, bus and tick source.
    pub fn new(registry: ComponentRegistry, bus: EventBus, clock: Arc<dyn TickSource>) -> Self {
        Self {
            registry,
            bus,
            clock,
            policy: DefectPolicy::default(),
            entities: EntityTable::default(),
            columns: Vec::new(),
            defects: Vec::new(),
            counters: Counter::new(),
        }
    }

    pub fn with_policy(mut self, policy: DefectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply host settings. Freezing only affects types not yet registered.
    pub fn with_settings(mut self, settings: &LifecycleSettings) -> Self {
        self.policy = settings.defect_policy;
        if settings.freeze_registry {
            self.registry.freeze();
        }
        self
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick()
    }

    pub fn policy(&self) -> DefectPolicy {
        self.policy
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn register<T: Component>(&mut self) -> Result<ComponentIndex, WorldError> {
        Ok(self.registry.register::<T>()?)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to `kind` events for every `T` component.
    pub fn subscribe<T, F>(&mut self, kind: LifecycleKind, handler: F) -> Result<(), WorldError>
    where
        T: Component,
        F: Fn(&mut World, &ComponentEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let index = self.register::<T>()?;
        Ok(self.bus.subscribe(kind, index, handler)?)
    }

    /// Subscribe to entity-scoped broadcasts of type `E`.
    pub fn subscribe_broadcast<E, F>(&mut self, handler: F) -> Result<(), WorldError>
    where
        E: 'static,
        F: Fn(&mut World, Entity, &E) -> HandlerResult + Send + Sync + 'static,
    {
        Ok(self.bus.subscribe_broadcast::<E, F>(handler)?)
    }

    /// Defects recorded so far, oldest first.
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn take_defects(&mut self) -> Vec<Defect> {
        std::mem::take(&mut self.defects)
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Create an empty entity in `PreInit`.
    pub fn spawn_entity(&mut self) -> Entity {
        let tick = self.current_tick();
        let entity = self.entities.spawn(tick);
        tracing::debug!(entity = %entity, tick = %tick, "spawned entity");
        entity
    }

    /// Spawn an entity, attach every component in builder order, then run
    /// the startup phase once all of them are initialized.
    pub fn spawn(&mut self, builder: EntityBuilder) -> Result<Entity, WorldError> {
        let entity = self.spawn_entity();
        for pending in builder.into_components() {
            let name = pending.name();
            if let Err(err) = pending.attach(self, entity) {
                tracing::warn!(entity = %entity, component = name, error = %err, "spawn aborted");
                if let Err(cleanup) = self.delete_entity(entity) {
                    tracing::warn!(entity = %entity, error = %cleanup, "failed to clean up partial entity");
                }
                return Err(err);
            }
        }
        self.start_entity(entity)?;
        Ok(entity)
    }

    pub fn entity(&self, entity: Entity) -> Option<&EntityRecord> {
        self.entities.get(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.get(entity).is_some()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Run the startup phase for `entity`.
    ///
    /// Every attached component is brought to `Initialized` before any of
    /// them receives `Startup`. Components attached by a startup handler are
    /// started in a later pass of the same call.
    pub fn start_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        match self.entity_stage(entity)? {
            EntityStage::Running => return Ok(()),
            EntityStage::Terminating | EntityStage::Deleted => {
                return Err(WorldError::EntityTerminating(entity))
            }
            EntityStage::PreInit | EntityStage::Initialized => {}
        }

        for handle in self.component_handles(entity) {
            if self.stage(handle) == Some(LifeStage::Added) {
                self.initialize(handle)?;
            }
        }
        self.set_entity_stage(entity, EntityStage::Initialized);

        loop {
            let pending: Vec<_> = self
                .component_handles(entity)
                .into_iter()
                .filter(|handle| self.stage(*handle) == Some(LifeStage::Initialized))
                .collect();
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if self.stage(handle) == Some(LifeStage::Initialized) {
                    self.startup(handle)?;
                }
            }
        }

        match self.entities.get_mut(entity) {
            Some(record) if record.stage < EntityStage::Terminating => {
                record.stage = EntityStage::Running;
            }
            // deleted by one of its own startup handlers
            _ => return Ok(()),
        }
        tracing::debug!(entity = %entity, "entity started");
        self.raise_local_event(entity, &EntityStarted);
        Ok(())
    }

    /// Tear down every component on `entity` and release it.
    ///
    /// Calling this again for an entity that is already terminating (for
    /// example from one of its own shutdown handlers) is a no-op. If a
    /// component is still mid-teardown further up the call stack, the entity
    /// stays `Terminating` and is released when that component is detached.
    pub fn delete_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        if self.entity_stage(entity)? >= EntityStage::Terminating {
            return Ok(());
        }
        self.set_entity_stage(entity, EntityStage::Terminating);
        tracing::debug!(entity = %entity, "deleting entity");
        self.raise_local_event(entity, &EntityTerminating);

        for handle in self.component_handles(entity) {
            if self.record(handle).is_some() {
                self.remove_component(entity, handle.index())?;
            }
        }

        match self.entities.get(entity).map(EntityRecord::len) {
            Some(0) => self.release_entity(entity),
            Some(pending) => tracing::debug!(
                entity = %entity,
                pending,
                "entity release deferred until teardown completes"
            ),
            // released by the last detach
            None => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Attach `value` to `entity` and drive it through `Add` and `Init`.
    ///
    /// If the entity has already started, the component is started too.
    /// Fails with an ownership error if the entity already holds a live `T`;
    /// the existing component is left untouched.
    pub fn attach_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<ComponentHandle, WorldError> {
        let index = self.register::<T>()?;
        if self.entity_stage(entity)? >= EntityStage::Terminating {
            return Err(WorldError::EntityTerminating(entity));
        }

        let (row, generation) = self.column_for::<T>(index).alloc(value);
        let handle = ComponentHandle::new(entity, index, row, generation);
        let attached = self
            .entities
            .get_mut(entity)
            .ok_or(WorldError::EntityNotFound(entity))
            .and_then(|owner| {
                owner
                    .attach(ComponentRecord::new(handle))
                    .map_err(WorldError::from)
            });
        match attached {
            Ok(Some(displaced)) => self.release_row(displaced.handle),
            Ok(None) => {}
            Err(err) => {
                self.release_row(handle);
                return Err(err);
            }
        }
        tracing::trace!(component = T::NAME, handle = %handle, "attached component");

        self.add_to_entity(handle)?;
        if self.stage(handle) == Some(LifeStage::Added) {
            self.initialize(handle)?;
        }
        if self.entity_stage(entity)? == EntityStage::Running
            && self.stage(handle) == Some(LifeStage::Initialized)
        {
            self.startup(handle)?;
        }
        Ok(handle)
    }

    /// Shut down, remove and detach the component in slot `index`.
    ///
    /// Returns `Ok(false)` without doing anything if that component is
    /// already being torn down further up the call stack.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        index: ComponentIndex,
    ) -> Result<bool, WorldError> {
        let record = self
            .entities
            .get(entity)
            .ok_or(WorldError::EntityNotFound(entity))?
            .get(index)
            .ok_or(WorldError::ComponentNotFound {
                entity,
                component: index,
            })?;
        let handle = record.handle;

        match record.stage {
            LifeStage::Stopping | LifeStage::Removing => {
                tracing::debug!(component = %handle, "removal already in progress");
                return Ok(false);
            }
            LifeStage::Deleted => {}
            LifeStage::Stopped => self.remove_from_entity(handle)?,
            _ => {
                self.shutdown(handle)?;
                if self.stage(handle) == Some(LifeStage::Stopped) {
                    self.remove_from_entity(handle)?;
                }
            }
        }

        if self.stage(handle) == Some(LifeStage::Deleted) {
            self.detach_component(entity, index)?;
        }
        Ok(true)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<bool, WorldError> {
        let index = self
            .registry
            .resolve::<T>()
            .ok_or(RegistryError::Unregistered { name: T::NAME })?;
        self.remove_component(entity, index)
    }

    /// Detach a `Deleted` component and free its storage row.
    ///
    /// Detaching the last component of a `Terminating` entity releases it.
    pub fn detach_component(
        &mut self,
        entity: Entity,
        index: ComponentIndex,
    ) -> Result<(), WorldError> {
        let owner = self
            .entities
            .get_mut(entity)
            .ok_or(WorldError::EntityNotFound(entity))?;
        let record = owner.detach(index)?;
        let release = owner.stage == EntityStage::Terminating && owner.is_empty();
        self.release_row(record.handle);
        tracing::trace!(component = %record.handle, "detached component");
        if release {
            self.release_entity(entity);
        }
        Ok(())
    }

    /// Stamp the component as modified on the current tick.
    pub fn dirty(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        let tick = self.current_tick();
        let record = self
            .record_mut(handle)
            .ok_or(WorldError::StaleHandle(handle))?;
        record.last_modified_tick = tick.max(record.creation_tick);
        Ok(())
    }

    pub fn record(&self, handle: ComponentHandle) -> Option<&ComponentRecord> {
        self.entities
            .get(handle.owner())?
            .get(handle.index())
            .filter(|record| record.handle == handle)
    }

    pub fn stage(&self, handle: ComponentHandle) -> Option<LifeStage> {
        self.record(handle).map(ComponentRecord::stage)
    }

    /// Handle of the `T` attached to `entity`, including one mid-removal.
    pub fn handle_of<T: Component>(&self, entity: Entity) -> Option<ComponentHandle> {
        let index = self.registry.resolve::<T>()?;
        self.entities
            .get(entity)?
            .get(index)
            .map(ComponentRecord::handle)
    }

    /// Borrow the `T` on `entity`, unless it is being removed.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let index = self.registry.resolve::<T>()?;
        let record = self.entities.get(entity)?.get(index)?;
        if record.is_deleted() {
            return None;
        }
        let handle = record.handle;
        self.column::<T>(index)?
            .get(handle.row(), handle.generation())
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let index = self.registry.resolve::<T>()?;
        let record = self.entities.get(entity)?.get(index)?;
        if record.is_deleted() {
            return None;
        }
        let handle = record.handle;
        self.columns
            .get_mut(index.as_usize())?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentColumn<T>>()?
            .get_mut(handle.row(), handle.generation())
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    // ------------------------------------------------------------------
    // Broadcasts
    // ------------------------------------------------------------------

    /// Deliver `event` to every broadcast subscriber of `E`, in order.
    ///
    /// The first failing handler stops delivery; the failure is recorded
    /// as a defect and never returned.
    pub fn raise_local_event<E: 'static>(&mut self, entity: Entity, event: &E) {
        let handlers = self.bus.broadcast_handlers(TypeId::of::<E>());
        if handlers.is_empty() {
            return;
        }
        self.counters.increment("bus.publish", 1);
        let payload: &dyn Any = event;

        let dispatching = self.bus.enter_dispatch();
        let mut failure = None;
        for (position, handler) in handlers.iter().enumerate() {
            if let Err(error) = handler(self, entity, payload) {
                failure = Some((position, error));
                break;
            }
        }
        drop(dispatching);

        if let Some((position, error)) = failure {
            self.handler_failed(entity, std::any::type_name::<E>(), position, error);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn record_mut(&mut self, handle: ComponentHandle) -> Option<&mut ComponentRecord> {
        self.entities
            .get_mut(handle.owner())?
            .get_mut(handle.index())
            .filter(|record| record.handle == handle)
    }

    pub(crate) fn handler_failed(
        &mut self,
        entity: Entity,
        event: &'static str,
        position: usize,
        error: HandlerError,
    ) {
        self.counters.increment("bus.handler_failed", 1);
        self.report(Defect::HandlerFailed {
            entity,
            event,
            position,
            message: error.message().to_string(),
        });
    }

    /// Log a defect, keep it, and panic if the policy says so.
    pub(crate) fn report(&mut self, defect: Defect) {
        tracing::error!(%defect, "lifecycle defect");
        let fatal = defect.is_fatal(self.policy);
        let message = defect.to_string();
        self.defects.push(defect);
        if fatal {
            panic!("lifecycle defect: {message}");
        }
    }

    /// Finish tearing down `handle` if its owner is being deleted.
    ///
    /// Picks up components whose removal was skipped by `delete_entity`
    /// because they were already mid-shutdown or mid-removal.
    pub(crate) fn continue_teardown(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        if self.entity_stage(handle.owner()).ok() != Some(EntityStage::Terminating) {
            return Ok(());
        }
        match self.stage(handle) {
            Some(LifeStage::Stopped) => self.remove_from_entity(handle),
            Some(LifeStage::Deleted) => self.detach_component(handle.owner(), handle.index()),
            _ => Ok(()),
        }
    }

    fn release_entity(&mut self, entity: Entity) {
        if let Some(mut record) = self.entities.release(entity) {
            record.stage = EntityStage::Deleted;
            tracing::debug!(entity = %entity, "released entity");
        }
    }

    fn entity_stage(&self, entity: Entity) -> Result<EntityStage, WorldError> {
        self.entities
            .get(entity)
            .map(EntityRecord::stage)
            .ok_or(WorldError::EntityNotFound(entity))
    }

    fn set_entity_stage(&mut self, entity: Entity, stage: EntityStage) {
        if let Some(record) = self.entities.get_mut(entity) {
            record.stage = stage;
        }
    }

    fn component_handles(&self, entity: Entity) -> Vec<ComponentHandle> {
        self.entities
            .get(entity)
            .map(|record| record.components().map(ComponentRecord::handle).collect())
            .unwrap_or_default()
    }

    fn column<T: Component>(&self, index: ComponentIndex) -> Option<&ComponentColumn<T>> {
        self.columns
            .get(index.as_usize())?
            .as_ref()?
            .as_any()
            .downcast_ref::<ComponentColumn<T>>()
    }

    fn column_for<T: Component>(&mut self, index: ComponentIndex) -> &mut ComponentColumn<T> {
        let slot = index.as_usize();
        if self.columns.len() <= slot {
            self.columns.resize_with(slot + 1, || None);
        }
        self.columns[slot]
            .get_or_insert_with(|| Box::new(ComponentColumn::<T>::new()))
            .as_any_mut()
            .downcast_mut::<ComponentColumn<T>>()
            .expect("column type matches its registered slot")
    }

    fn release_row(&mut self, handle: ComponentHandle) {
        if let Some(Some(column)) = self.columns.get_mut(handle.index().as_usize()) {
            column.release(handle.row(), handle.generation());
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(
            ComponentRegistry::new(),
            EventBus::new(),
            Arc::new(SimulationClock::new()),
        )
    }
}
