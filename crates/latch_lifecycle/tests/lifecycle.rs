use latch_lifecycle::config::LifecycleSettings;
use latch_lifecycle::ecs::{
    BusError, Component, ComponentEvent, ComponentRegistry, Defect, DefectPolicy, Entity,
    EntityBuilder, EntityStarted, EntityTerminating, EventBus, Finalizer, HandlerError,
    HandlerResult, LifeStage, LifecycleKind, OwnershipError, RegistryError, World, WorldError,
};
use latch_lifecycle::spawn;
use latch_lifecycle::time::{SimulationClock, Tick};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, PartialEq)]
struct Health(u32);

impl Component for Health {
    const NAME: &'static str = "Health";
}

#[derive(Debug)]
struct Armor;

impl Component for Armor {
    const NAME: &'static str = "Armor";
}

/// Removes itself from its own startup handler while armed.
struct Fuse {
    armed: bool,
}

impl Component for Fuse {
    const NAME: &'static str = "Fuse";

    fn on_startup(world: &mut World, event: &ComponentEvent) -> HandlerResult {
        if world.get::<Fuse>(event.entity()).map_or(false, |fuse| fuse.armed) {
            world.remove_component(event.entity(), event.index())?;
        }
        Ok(())
    }
}

/// Attaches an `Armor` to its owner while starting up.
struct Forge;

impl Component for Forge {
    const NAME: &'static str = "Forge";

    fn on_startup(world: &mut World, event: &ComponentEvent) -> HandlerResult {
        world.attach_component(event.entity(), Armor)?;
        Ok(())
    }
}

/// Removes itself while its `Add` event is still being delivered.
struct Stillborn;

impl Component for Stillborn {
    const NAME: &'static str = "Stillborn";

    fn on_add(world: &mut World, event: &ComponentEvent) -> HandlerResult {
        world.remove_component(event.entity(), event.index())?;
        Ok(())
    }
}

/// Deletes its owner from its own shutdown handler.
struct ShutdownTrip {
    finalized: Arc<AtomicUsize>,
}

impl Component for ShutdownTrip {
    const NAME: &'static str = "ShutdownTrip";

    fn on_shutdown(world: &mut World, event: &ComponentEvent) -> HandlerResult {
        world.delete_entity(event.entity())?;
        Ok(())
    }

    fn finalize(&mut self, finalizer: &mut Finalizer) {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        finalizer.mark_deleted();
    }
}

/// Deletes its owner from its own remove handler.
struct RemoveTrip {
    finalized: Arc<AtomicUsize>,
}

impl Component for RemoveTrip {
    const NAME: &'static str = "RemoveTrip";

    fn on_remove(world: &mut World, event: &ComponentEvent) -> HandlerResult {
        world.delete_entity(event.entity())?;
        Ok(())
    }

    fn finalize(&mut self, finalizer: &mut Finalizer) {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        finalizer.mark_deleted();
    }
}

/// Forgets to confirm its own deletion.
struct Leaky;

impl Component for Leaky {
    const NAME: &'static str = "Leaky";

    fn finalize(&mut self, _finalizer: &mut Finalizer) {}
}

type Log = Arc<Mutex<Vec<(&'static str, LifecycleKind, LifeStage)>>>;

fn world() -> World {
    World::default().with_policy(DefectPolicy::FailForward)
}

/// Record every lifecycle event for `T` together with the stage seen during dispatch.
fn trace<T: Component>(world: &mut World, log: &Log) {
    for kind in LifecycleKind::ALL {
        let log = Arc::clone(log);
        world
            .subscribe::<T, _>(kind, move |world, event| {
                // An earlier handler may already have detached the target.
                if let Some(stage) = world.stage(event.handle) {
                    log.lock().unwrap().push((T::NAME, event.kind, stage));
                }
                Ok(())
            })
            .unwrap();
    }
}

fn events(log: &Log) -> Vec<(&'static str, LifecycleKind, LifeStage)> {
    log.lock().unwrap().clone()
}

#[test]
fn full_lifecycle_visits_every_stage_in_order() {
    let mut world = world();
    let log = Log::default();
    trace::<Health>(&mut world, &log);

    let entity = spawn!(world, Health(5)).unwrap();
    assert!(world.remove::<Health>(entity).unwrap());

    assert_eq!(
        events(&log),
        vec![
            ("Health", LifecycleKind::Add, LifeStage::Adding),
            ("Health", LifecycleKind::Init, LifeStage::Initializing),
            ("Health", LifecycleKind::Startup, LifeStage::Starting),
            ("Health", LifecycleKind::Shutdown, LifeStage::Stopping),
            ("Health", LifecycleKind::Remove, LifeStage::Removing),
        ]
    );
    assert!(!world.has::<Health>(entity));
    assert!(world.defects().is_empty());
}

#[test]
fn never_started_component_skips_shutdown_event() {
    let mut world = world();
    let log = Log::default();
    trace::<Health>(&mut world, &log);

    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Health(5)).unwrap();
    assert_eq!(world.stage(handle), Some(LifeStage::Initialized));

    world.shutdown(handle).unwrap();
    assert_eq!(world.stage(handle), Some(LifeStage::Stopped));
    world.remove_from_entity(handle).unwrap();
    assert_eq!(world.stage(handle), Some(LifeStage::Deleted));

    let kinds: Vec<_> = events(&log).into_iter().map(|(_, kind, _)| kind).collect();
    assert_eq!(
        kinds,
        vec![LifecycleKind::Add, LifecycleKind::Init, LifecycleKind::Remove]
    );
}

#[test]
fn every_component_initializes_before_any_starts() {
    let mut world = world();
    let log = Log::default();
    trace::<Health>(&mut world, &log);
    trace::<Armor>(&mut world, &log);

    spawn!(world, Health(1), Armor).unwrap();

    let recorded = events(&log);
    let last_init = recorded
        .iter()
        .rposition(|(_, kind, _)| *kind == LifecycleKind::Init)
        .unwrap();
    let first_startup = recorded
        .iter()
        .position(|(_, kind, _)| *kind == LifecycleKind::Startup)
        .unwrap();
    assert!(last_init < first_startup, "{recorded:?}");
    assert_eq!(
        recorded
            .iter()
            .filter(|(_, kind, _)| *kind == LifecycleKind::Startup)
            .count(),
        2
    );
}

#[test]
fn self_removal_during_startup_ends_deleted() {
    let mut world = world();
    let log = Log::default();
    trace::<Fuse>(&mut world, &log);

    let entity = spawn!(world, Fuse { armed: true }).unwrap();

    assert!(world.handle_of::<Fuse>(entity).is_none());
    assert!(!world.has::<Fuse>(entity));
    // Fuse's own startup hook runs before subscribers, so by the time the
    // Startup subscriber is called the component is already gone.
    assert_eq!(
        events(&log),
        vec![
            ("Fuse", LifecycleKind::Add, LifeStage::Adding),
            ("Fuse", LifecycleKind::Init, LifeStage::Initializing),
            ("Fuse", LifecycleKind::Shutdown, LifeStage::Stopping),
            ("Fuse", LifecycleKind::Remove, LifeStage::Removing),
        ]
    );
    assert!(world.defects().is_empty());

    // The slot is free again.
    let handle = world.attach_component(entity, Fuse { armed: false }).unwrap();
    assert_eq!(world.stage(handle), Some(LifeStage::Running));
}

#[test]
fn second_attach_of_same_type_is_rejected() {
    let mut world = world();
    let entity = spawn!(world, Health(7)).unwrap();
    let first = world.handle_of::<Health>(entity).unwrap();

    let err = world.attach_component(entity, Health(9)).unwrap_err();
    assert_eq!(
        err,
        WorldError::Ownership(OwnershipError::SlotOccupied {
            entity,
            component: first.index(),
            stage: LifeStage::Running,
        })
    );
    assert_eq!(world.stage(first), Some(LifeStage::Running));
    assert_eq!(world.get::<Health>(entity), Some(&Health(7)));
}

#[test]
fn removal_during_add_takes_the_never_started_shortcut() {
    let mut world = world();
    let log = Log::default();
    trace::<Stillborn>(&mut world, &log);

    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Stillborn).unwrap();

    assert_eq!(world.stage(handle), None);
    assert!(world.handle_of::<Stillborn>(entity).is_none());
    // Only Remove is observed: the Add subscriber runs after the own hook
    // has already detached the component, and Shutdown is skipped.
    assert_eq!(
        events(&log),
        vec![("Stillborn", LifecycleKind::Remove, LifeStage::Removing)]
    );
    latch_metrics::metrics! {
        assert_eq!(world.counters().get("lifecycle.shutdown_skipped"), 1);
        assert_eq!(world.counters().get("lifecycle.init"), 0);
    }
    assert!(world.defects().is_empty());
}

#[test]
fn deleting_owner_from_own_shutdown_finishes_teardown() {
    let mut world = world();
    let log = Log::default();
    trace::<ShutdownTrip>(&mut world, &log);
    let finalized = Arc::new(AtomicUsize::new(0));

    let entity = spawn!(
        world,
        Health(1),
        ShutdownTrip {
            finalized: Arc::clone(&finalized),
        }
    )
    .unwrap();
    assert!(world.remove::<ShutdownTrip>(entity).unwrap());

    assert!(!world.contains(entity));
    assert_eq!(world.entity_count(), 0);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    let removes = events(&log)
        .into_iter()
        .filter(|(_, kind, stage)| *kind == LifecycleKind::Remove && *stage == LifeStage::Removing)
        .count();
    assert_eq!(removes, 1);
    assert!(world.defects().is_empty());
}

#[test]
fn deleting_owner_from_own_remove_finishes_teardown() {
    let mut world = world();
    let finalized = Arc::new(AtomicUsize::new(0));

    let entity = spawn!(
        world,
        RemoveTrip {
            finalized: Arc::clone(&finalized),
        },
        Health(1)
    )
    .unwrap();
    let trip = world.handle_of::<RemoveTrip>(entity).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let stage_seen = Arc::clone(&seen);
    world
        .subscribe_broadcast::<EntityTerminating, _>(move |world, _, _| {
            *stage_seen.lock().unwrap() = world.stage(trip);
            Ok(())
        })
        .unwrap();

    assert!(world.remove::<RemoveTrip>(entity).unwrap());

    assert_eq!(*seen.lock().unwrap(), Some(LifeStage::Removing));
    assert!(!world.contains(entity));
    assert_eq!(world.record(trip), None);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert!(world.defects().is_empty());
}

#[test]
#[should_panic(expected = "did not mark itself deleted")]
fn skipped_finalize_is_forced_to_deleted_before_failing_fast() {
    let mut world = World::default().with_policy(DefectPolicy::FailFast);
    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Leaky).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| world.remove::<Leaky>(entity)));

    assert_eq!(world.stage(handle), Some(LifeStage::Deleted));
    assert!(matches!(
        world.defects(),
        [Defect::FinalizeSkipped { component: "Leaky", .. }]
    ));
    if let Err(panic) = result {
        panic::resume_unwind(panic);
    }
}

#[test]
fn panicking_handler_does_not_wedge_the_bus() {
    let mut world = world();
    world
        .subscribe::<Health, _>(LifecycleKind::Init, |_, _| panic!("handler blew up"))
        .unwrap();

    let entity = world.spawn_entity();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        world.attach_component(entity, Health(1))
    }));

    assert!(result.is_err());
    assert!(!world.bus().is_dispatching());
    assert!(world
        .subscribe_broadcast::<EntityStarted, _>(|_, _, _| Ok(()))
        .is_ok());
}

#[test]
fn ticks_are_stamped_on_add_and_dirty() {
    let clock = Arc::new(SimulationClock::starting_at(Tick(10)));
    let mut world = World::new(ComponentRegistry::new(), EventBus::new(), clock.clone())
        .with_policy(DefectPolicy::FailForward);

    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Health(1)).unwrap();
    let record = world.record(handle).unwrap();
    assert_eq!(record.creation_tick(), Tick(10));
    assert_eq!(record.last_modified_tick(), Tick(10));

    clock.advance_to(Tick(12));
    world.dirty(handle).unwrap();
    let record = world.record(handle).unwrap();
    assert_eq!(record.creation_tick(), Tick(10));
    assert_eq!(record.last_modified_tick(), Tick(12));
}

#[test]
fn failing_handler_stops_delivery_but_not_the_transition() {
    let mut world = world();
    let reached = Arc::new(Mutex::new(false));

    world
        .subscribe::<Health, _>(LifecycleKind::Init, |_, _| {
            Err(HandlerError::new("out of mana"))
        })
        .unwrap();
    let flag = Arc::clone(&reached);
    world
        .subscribe::<Health, _>(LifecycleKind::Init, move |_, _| {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .unwrap();

    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Health(3)).unwrap();

    assert_eq!(world.stage(handle), Some(LifeStage::Initialized));
    assert!(!*reached.lock().unwrap());
    assert_eq!(
        world.defects(),
        &[Defect::HandlerFailed {
            entity,
            event: "init",
            position: 1,
            message: "out of mana".to_string(),
        }]
    );
}

#[test]
fn handler_failures_are_isolated_even_when_failing_fast() {
    let mut world = World::default().with_policy(DefectPolicy::FailFast);
    world
        .subscribe::<Health, _>(LifecycleKind::Add, |_, _| Err("boom".into()))
        .unwrap();

    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Health(3)).unwrap();
    assert_eq!(world.stage(handle), Some(LifeStage::Initialized));
    assert_eq!(world.take_defects().len(), 1);
    assert!(world.defects().is_empty());
}

#[test]
#[should_panic(expected = "lifecycle defect")]
fn out_of_order_transition_panics_when_failing_fast() {
    let mut world = World::default().with_policy(DefectPolicy::FailFast);
    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Health(1)).unwrap();
    world.startup(handle).unwrap();
    world.startup(handle).unwrap();
}

#[test]
fn out_of_order_transition_is_logged_when_failing_forward() {
    let mut world = world();
    let entity = world.spawn_entity();
    let handle = world.attach_component(entity, Health(1)).unwrap();
    world.add_to_entity(handle).unwrap();

    assert_eq!(world.stage(handle), Some(LifeStage::Initialized));
    assert!(matches!(
        world.defects(),
        [Defect::Sequencing {
            operation: "add_to_entity",
            from: LifeStage::Initialized,
            to: LifeStage::Adding,
            ..
        }]
    ));
}

#[test]
fn component_attached_during_startup_is_started_too() {
    let mut world = world();
    let entity = spawn!(world, Forge).unwrap();

    let armor = world.handle_of::<Armor>(entity).unwrap();
    assert_eq!(world.stage(armor), Some(LifeStage::Running));
}

#[test]
fn late_attach_to_running_entity_starts_immediately() {
    let mut world = world();
    let entity = spawn!(world, Health(1)).unwrap();

    let handle = world.attach_component(entity, Armor).unwrap();
    assert_eq!(world.stage(handle), Some(LifeStage::Running));
}

#[test]
fn entity_broadcasts_reach_subscribers() {
    let mut world = world();
    let seen: Arc<Mutex<Vec<(&'static str, Entity)>>> = Arc::default();

    let started = Arc::clone(&seen);
    world
        .subscribe_broadcast::<EntityStarted, _>(move |_, entity, _| {
            started.lock().unwrap().push(("started", entity));
            Ok(())
        })
        .unwrap();
    let terminating = Arc::clone(&seen);
    world
        .subscribe_broadcast::<EntityTerminating, _>(move |world, entity, _| {
            // Components are still attached when termination is announced.
            assert!(world.has::<Health>(entity));
            terminating.lock().unwrap().push(("terminating", entity));
            Ok(())
        })
        .unwrap();

    let entity = spawn!(world, Health(1)).unwrap();
    world.delete_entity(entity).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("started", entity), ("terminating", entity)]
    );
}

#[test]
fn delete_entity_tears_down_every_component() {
    let mut world = world();
    let log = Log::default();
    trace::<Health>(&mut world, &log);
    trace::<Armor>(&mut world, &log);

    let entity = spawn!(world, Health(1), Armor).unwrap();
    let health = world.handle_of::<Health>(entity).unwrap();
    world.delete_entity(entity).unwrap();

    assert!(!world.contains(entity));
    assert_eq!(world.entity_count(), 0);
    assert_eq!(world.record(health), None);
    assert_eq!(
        world.attach_component(entity, Health(2)),
        Err(WorldError::EntityNotFound(entity))
    );

    let removed = events(&log)
        .into_iter()
        .filter(|(_, kind, _)| *kind == LifecycleKind::Remove)
        .count();
    assert_eq!(removed, 2);
}

#[test]
fn subscribing_from_a_handler_is_rejected() {
    let mut world = world();
    let outcome: Arc<Mutex<Option<Result<(), WorldError>>>> = Arc::default();

    let slot = Arc::clone(&outcome);
    world
        .subscribe::<Health, _>(LifecycleKind::Init, move |world, _| {
            let result = world.subscribe_broadcast::<EntityStarted, _>(|_, _, _| Ok(()));
            *slot.lock().unwrap() = Some(result);
            Ok(())
        })
        .unwrap();

    let entity = world.spawn_entity();
    world.attach_component(entity, Health(1)).unwrap();

    assert_eq!(
        *outcome.lock().unwrap(),
        Some(Err(WorldError::Bus(BusError::SubscribeDuringDispatch)))
    );
    assert!(!world.bus().is_dispatching());
}

#[test]
fn frozen_registry_rejects_new_types() {
    let settings = LifecycleSettings {
        defect_policy: DefectPolicy::FailForward,
        freeze_registry: false,
    };
    let mut world = World::default().with_settings(&settings);
    world.register::<Health>().unwrap();
    let mut world = world.with_settings(&LifecycleSettings {
        freeze_registry: true,
        ..settings
    });

    let entity = world.spawn_entity();
    assert!(world.attach_component(entity, Health(1)).is_ok());
    assert_eq!(
        world.attach_component(entity, Armor),
        Err(WorldError::Registry(RegistryError::Frozen { name: "Armor" }))
    );
}

#[test]
fn failed_spawn_cleans_up_the_partial_entity() {
    let settings = LifecycleSettings {
        defect_policy: DefectPolicy::FailForward,
        freeze_registry: true,
    };
    let mut world = World::default().with_settings(&settings);

    let result = world.spawn(EntityBuilder::new().with(Health(1)));
    assert!(matches!(result, Err(WorldError::Registry(RegistryError::Frozen { .. }))));
    assert_eq!(world.entity_count(), 0);
}
