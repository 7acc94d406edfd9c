//! Latch Runtime
//!
//! Host binary: loads settings, installs logging, and drives a small
//! population of entities through their full lifecycle over a few ticks.

use anyhow::{Context, Result};
use latch_lifecycle::ecs::{
    Component, ComponentEvent, Entity, EntityStarted, EntityTerminating, Finalizer,
    HandlerResult, LifecycleKind, World,
};
use latch_lifecycle::spawn;
use latch_lifecycle::time::SimulationClock;
use latch_services::Settings;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    const NAME: &'static str = "Position";
}

#[derive(Debug)]
struct Velocity {
    x: f32,
    y: f32,
}

impl Component for Velocity {
    const NAME: &'static str = "Velocity";
}

/// Deletes its owner when it runs out.
#[derive(Debug)]
struct Lifetime {
    ticks_left: u32,
}

impl Component for Lifetime {
    const NAME: &'static str = "Lifetime";

    fn on_startup(world: &mut World, event: &ComponentEvent) -> HandlerResult {
        // Zero-length lifetimes never get to run.
        if world.get::<Lifetime>(event.entity()).map_or(false, |l| l.ticks_left == 0) {
            world.delete_entity(event.entity())?;
        }
        Ok(())
    }

    fn finalize(&mut self, finalizer: &mut Finalizer) {
        tracing::debug!(ticks_left = self.ticks_left, "lifetime finalized");
        finalizer.mark_deleted();
    }
}

fn main() -> Result<()> {
    let settings = Settings::from_env().context("loading settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
                .context("invalid log filter")?,
        )
        .init();

    tracing::info!("Latch Lifecycle v{}", latch_lifecycle::VERSION);

    let clock = Arc::new(SimulationClock::new());
    let mut world = World::new(Default::default(), Default::default(), clock.clone())
        .with_settings(&settings.lifecycle);
    world.register::<Position>()?;
    world.register::<Velocity>()?;
    world.register::<Lifetime>()?;

    world.subscribe_broadcast::<EntityStarted, _>(|_, entity, _| {
        tracing::info!(entity = %entity, "entity started");
        Ok(())
    })?;
    world.subscribe_broadcast::<EntityTerminating, _>(|_, entity, _| {
        tracing::info!(entity = %entity, "entity terminating");
        Ok(())
    })?;
    world.subscribe::<Velocity, _>(LifecycleKind::Shutdown, |world, event| {
        if let Some(position) = world.get::<Position>(event.entity()) {
            tracing::info!(entity = %event.entity(), x = position.x, y = position.y, "came to rest");
        }
        Ok(())
    })?;

    let mut entities: Vec<Entity> = Vec::new();
    for i in 0..4u32 {
        let entity = spawn!(
            world,
            Position { x: 0.0, y: 0.0 },
            Velocity { x: 1.0, y: i as f32 },
            Lifetime { ticks_left: i * 2 }
        )?;
        entities.push(entity);
    }

    for _ in 0..settings.simulation.ticks {
        let tick = clock.advance_tick();
        tracing::debug!(tick = %tick, "tick");
        entities.retain(|entity| world.contains(*entity));

        for &entity in &entities {
            step(&mut world, entity)?;
        }
    }

    for entity in entities.drain(..) {
        if world.contains(entity) {
            world.delete_entity(entity)?;
        }
    }

    for (name, count) in world.counters().iter() {
        tracing::info!(counter = name, count, "metrics");
    }
    let defects = world.take_defects();
    if defects.is_empty() {
        tracing::info!(ticks = clock.tick_count(), "simulation finished cleanly");
    } else {
        for defect in &defects {
            tracing::warn!(%defect, "defect");
        }
        anyhow::bail!("{} lifecycle defect(s) recorded", defects.len());
    }
    Ok(())
}

/// Integrate one entity and count down its lifetime.
fn step(world: &mut World, entity: Entity) -> Result<()> {
    let Some(velocity) = world.get::<Velocity>(entity).map(|v| (v.x, v.y)) else {
        return Ok(());
    };
    if let Some(position) = world.get_mut::<Position>(entity) {
        position.x += velocity.0;
        position.y += velocity.1;
    }
    if let Some(handle) = world.handle_of::<Position>(entity) {
        world.dirty(handle)?;
    }

    let expired = match world.get_mut::<Lifetime>(entity) {
        Some(lifetime) => {
            lifetime.ticks_left = lifetime.ticks_left.saturating_sub(1);
            lifetime.ticks_left == 0
        }
        None => false,
    };
    if expired {
        world.remove::<Velocity>(entity)?;
        world.delete_entity(entity)?;
    }
    Ok(())
}
