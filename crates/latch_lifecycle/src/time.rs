//! Deterministic time system
//!
//! Fixed 60Hz tick rate. The lifecycle core only ever reads the current tick;
//! advancing it is the scheduler's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Fixed simulation tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;
const TICK_MICROS: u64 = 1_000_000 / TICK_RATE_HZ as u64;
pub const TICK_DURATION: Duration = Duration::from_micros(TICK_MICROS); // ~16.666ms

/// Monotonically increasing simulation time step.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of the external simulation clock.
pub trait TickSource: Send + Sync {
    fn current_tick(&self) -> Tick;
}

/// Simulation time tracker shared between the scheduler (writer) and
/// the world (reader).
#[derive(Debug, Default)]
pub struct SimulationClock {
    tick_count: AtomicU64,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::starting_at(Tick::ZERO)
    }

    pub fn starting_at(tick: Tick) -> Self {
        Self {
            tick_count: AtomicU64::new(tick.0),
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Advance by one tick and return the new tick.
    pub fn advance_tick(&self) -> Tick {
        Tick(self.tick_count.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Jump forward to `tick`. Going backwards is ignored.
    pub fn advance_to(&self, tick: Tick) {
        self.tick_count.fetch_max(tick.0, Ordering::AcqRel);
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_micros(TICK_MICROS.saturating_mul(self.tick_count()))
    }
}

impl TickSource for SimulationClock {
    fn current_tick(&self) -> Tick {
        Tick(self.tick_count())
    }
}
