//! The five component lifecycle transitions.
//!
//! Each operation validates the current stage against
//! [`LifeStage::can_transition`], writes the transitional stage, publishes the
//! matching event and then settles on the resulting stage. If a handler moved
//! the component further along (for example by removing it) the settle write
//! is skipped so the stage never goes backwards.

use crate::ecs::storage::ErasedColumn;
use crate::ecs::{
    ComponentEvent, ComponentHandle, Defect, Finalizer, LifeStage, LifecycleKind, World,
    WorldError,
};

impl World {
    /// `PreAdd -> Added`, stamping creation and modification ticks.
    pub fn add_to_entity(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        if !self.check_sequence(handle, "add_to_entity", LifeStage::Adding)? {
            return Ok(());
        }
        let tick = self.current_tick();
        if let Some(record) = self.record_mut(handle) {
            record.creation_tick = tick;
            record.last_modified_tick = tick;
        }
        self.dispatch(handle, LifecycleKind::Add, LifeStage::Adding, LifeStage::Added);
        Ok(())
    }

    /// `Added -> Initialized`.
    pub fn initialize(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        if !self.check_sequence(handle, "initialize", LifeStage::Initializing)? {
            return Ok(());
        }
        self.dispatch(
            handle,
            LifecycleKind::Init,
            LifeStage::Initializing,
            LifeStage::Initialized,
        );
        Ok(())
    }

    /// `Initialized -> Running`.
    pub fn startup(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        if !self.check_sequence(handle, "startup", LifeStage::Starting)? {
            return Ok(());
        }
        self.dispatch(handle, LifecycleKind::Startup, LifeStage::Starting, LifeStage::Running);
        Ok(())
    }

    /// Bring a component to `Stopped`.
    ///
    /// A component that never started goes straight to `Stopped` without a
    /// `Shutdown` event.
    pub fn shutdown(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        let from = self.require_stage(handle)?;
        if from <= LifeStage::Initialized {
            if !self.check_sequence(handle, "shutdown", LifeStage::Stopped)? {
                return Ok(());
            }
            self.counters.increment("lifecycle.shutdown_skipped", 1);
            self.write_stage(handle, LifeStage::Stopped);
            return self.continue_teardown(handle);
        }

        if !self.check_sequence(handle, "shutdown", LifeStage::Stopping)? {
            return Ok(());
        }
        self.dispatch(handle, LifecycleKind::Shutdown, LifeStage::Stopping, LifeStage::Stopped);
        self.continue_teardown(handle)
    }

    /// Publish `Remove`, finalize the component and settle on `Deleted`.
    ///
    /// The component stays attached, unless its owner is being deleted.
    pub fn remove_from_entity(&mut self, handle: ComponentHandle) -> Result<(), WorldError> {
        if !self.check_sequence(handle, "remove_from_entity", LifeStage::Removing)? {
            return Ok(());
        }
        self.write_stage(handle, LifeStage::Removing);
        self.publish(ComponentEvent::new(LifecycleKind::Remove, handle));

        if self.stage(handle) != Some(LifeStage::Removing) {
            tracing::warn!(component = %handle, "component vanished during remove dispatch");
            return Ok(());
        }

        let mut finalizer = Finalizer::new();
        let finalized = self
            .columns
            .get_mut(handle.index().as_usize())
            .and_then(Option::as_mut)
            .map_or(false, |column: &mut Box<dyn ErasedColumn>| {
                column.finalize(handle.row(), handle.generation(), &mut finalizer)
            });
        if !finalized {
            tracing::warn!(component = %handle, "no storage row to finalize");
        }

        self.write_stage(handle, LifeStage::Deleted);
        if finalized && !finalizer.is_marked() {
            let component = self.registry.name_of(handle.index());
            self.report(Defect::FinalizeSkipped { handle, component });
        }
        self.continue_teardown(handle)
    }

    /// Deliver `event` to the component's own hook, then to subscribers.
    ///
    /// Stops at the first failing handler. Failures are reported as defects
    /// and never returned.
    pub(crate) fn publish(&mut self, event: ComponentEvent) {
        let index = event.index();
        let Some(own) = self.registry.lookup(index).map(|info| info.hooks.get(event.kind)) else {
            tracing::warn!(component = %index, "publish for unregistered component slot");
            return;
        };
        let subscribers = self.bus.component_handlers(event.kind, index);
        self.counters.increment("bus.publish", 1);
        self.counters.increment(event.kind.counter(), 1);

        let dispatching = self.bus.enter_dispatch();
        let mut failure = own(self, &event).err().map(|error| (0, error));
        if failure.is_none() {
            for (position, handler) in subscribers.iter().enumerate() {
                if let Err(error) = handler(self, &event) {
                    failure = Some((position + 1, error));
                    break;
                }
            }
        }
        drop(dispatching);

        if let Some((position, error)) = failure {
            self.handler_failed(event.entity(), event.kind.name(), position, error);
        }
    }

    fn dispatch(
        &mut self,
        handle: ComponentHandle,
        kind: LifecycleKind,
        transitional: LifeStage,
        settled: LifeStage,
    ) {
        self.write_stage(handle, transitional);
        self.publish(ComponentEvent::new(kind, handle));
        match self.stage(handle) {
            Some(stage) if stage == transitional => self.write_stage(handle, settled),
            stage => tracing::warn!(
                component = %handle,
                expected = %transitional,
                actual = ?stage,
                "transition superseded during dispatch"
            ),
        }
    }

    fn require_stage(&self, handle: ComponentHandle) -> Result<LifeStage, WorldError> {
        self.stage(handle).ok_or(WorldError::ComponentNotFound {
            entity: handle.owner(),
            component: handle.index(),
        })
    }

    /// Report a sequencing defect if `to` is not reachable. Returns whether
    /// the caller may proceed.
    fn check_sequence(
        &mut self,
        handle: ComponentHandle,
        operation: &'static str,
        to: LifeStage,
    ) -> Result<bool, WorldError> {
        let from = self.require_stage(handle)?;
        if from.can_transition(to) {
            return Ok(true);
        }
        let component = self.registry.name_of(handle.index());
        self.report(Defect::Sequencing {
            handle,
            component,
            operation,
            from,
            to,
        });
        Ok(false)
    }

    fn write_stage(&mut self, handle: ComponentHandle, to: LifeStage) {
        if let Some(record) = self.record_mut(handle) {
            tracing::trace!(component = %handle, from = %record.stage, to = %to, "stage");
            record.stage = to;
        }
    }
}
