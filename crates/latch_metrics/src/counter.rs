//! Named counters for tracking events

use std::collections::BTreeMap;

/// Monotonic event tallies keyed by a static name such as `"lifecycle.add"`.
///
/// Iteration is in name order so reports are stable between runs.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    counters: BTreeMap<&'static str, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, name: &'static str, value: usize) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, name: &str) {
        if let Some(count) = self.counters.get_mut(name) {
            *count = 0;
        }
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counters.iter().map(|(name, count)| (*name, *count))
    }
}
