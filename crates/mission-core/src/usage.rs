use crate::models::TokenUsage;

/// Holds the latest usage snapshot reported by the orchestrator.
///
/// Each update replaces the previous snapshot wholesale; the orchestrator owns
/// the running totals, so nothing is summed here.
#[derive(Debug, Clone, Default)]
pub struct UsageAccumulator {
    current: TokenUsage,
    updates: u64,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> TokenUsage {
        self.current
    }

    pub fn replace(&mut self, snapshot: TokenUsage) {
        self.current = snapshot;
        self.updates += 1;
    }

    /// Number of snapshots received since the last reset.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
