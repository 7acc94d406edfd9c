//! Latch Metrics - Common utilities for runtime instrumentation
//!
//! Provides zero-cost abstractions for metrics collection that completely
//! vanish in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use latch_metrics::Counter;
//!
//! let mut counter = Counter::new();
//! counter.increment("lifecycle.add", 1);
//! println!("adds: {}", counter.get("lifecycle.add"));
//! ```
//!
//! In production builds (without `metrics` feature), the counter is a
//! zero-sized stub and every call compiles to nothing.

#[cfg(feature = "metrics")]
mod counter;

#[cfg(feature = "metrics")]
pub use counter::Counter;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Clone, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: usize) {}
    pub fn get(&self, _name: &str) -> usize { 0 }
    pub fn reset(&mut self, _name: &str) {}
    pub fn reset_all(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ { std::iter::empty() }
}
