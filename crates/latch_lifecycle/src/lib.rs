//! Latch Lifecycle
//!
//! Component lifecycle runtime for the Latch simulation:
//! - Stage machine for component instances
//! - Synchronous, re-entrant lifecycle event bus
//! - Dense component registry and arena-backed storage
//! - Deterministic tick source

pub mod config;
pub mod ecs;
pub mod time;

pub use config::LifecycleSettings;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
