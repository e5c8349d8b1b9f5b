use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Accumulates call counts and total time per named operation. Shared by
/// all workers of one scan pass.
#[derive(Debug, Default)]
pub struct OpTimings {
    ops: DashMap<&'static str, (u64, Duration)>,
}

impl OpTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, op: &'static str, elapsed: Duration) {
        let mut entry = self.ops.entry(op).or_insert((0, Duration::ZERO));
        entry.0 += 1;
        entry.1 += elapsed;
    }

    /// Runs `f` and records how long it took under `op`.
    pub fn time<T>(&self, op: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        self.record(op, start.elapsed());
        value
    }

    /// (operation, calls, total time), sorted by operation name.
    pub fn summary(&self) -> Vec<(&'static str, u64, Duration)> {
        let mut rows: Vec<_> = self
            .ops
            .iter()
            .map(|entry| (*entry.key(), entry.value().0, entry.value().1))
            .collect();
        rows.sort_by_key(|row| row.0);
        rows
    }
}
