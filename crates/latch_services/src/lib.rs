//! Latch Services Layer
//!
//! Host-side services for the lifecycle runtime. Currently the settings file.

pub mod settings;

pub use settings::{LoggingSettings, Settings, SettingsError, SimulationSettings};
