//! Metrics collection for the virtual clock

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of counters collected by a clock
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockMetrics {
    /// Completed `tick` calls, nested ones included
    pub total_ticks: u64,

    /// Jobs created by schedule calls
    pub timers_scheduled: u64,

    /// Callback invocations, one per firing of a recurring job
    pub timers_fired: u64,

    /// Jobs removed by an explicit cancel
    pub timers_cancelled: u64,

    /// Callback invocations that returned an error
    pub callback_failures: u64,

    /// Most callbacks fired by a single `tick` call
    pub max_fires_per_tick: u64,

    /// Number of `reset` calls
    pub resets: u64,
}

/// Counter sink owned by one clock
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_ticks: AtomicU64,
    timers_scheduled: AtomicU64,
    timers_fired: AtomicU64,
    timers_cancelled: AtomicU64,
    callback_failures: AtomicU64,
    max_fires_per_tick: AtomicU64,
    resets: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scheduled(&self) {
        self.timers_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fired(&self) {
        self.timers_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.timers_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished `tick` call and how many callbacks it fired
    pub fn record_tick(&self, fired: u64) {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.max_fires_per_tick.fetch_max(fired, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> ClockMetrics {
        ClockMetrics {
            total_ticks: self.total_ticks.load(Ordering::Relaxed),
            timers_scheduled: self.timers_scheduled.load(Ordering::Relaxed),
            timers_fired: self.timers_fired.load(Ordering::Relaxed),
            timers_cancelled: self.timers_cancelled.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            max_fires_per_tick: self.max_fires_per_tick.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.total_ticks.store(0, Ordering::Relaxed);
        self.timers_scheduled.store(0, Ordering::Relaxed);
        self.timers_fired.store(0, Ordering::Relaxed);
        self.timers_cancelled.store(0, Ordering::Relaxed);
        self.callback_failures.store(0, Ordering::Relaxed);
        self.max_fires_per_tick.store(0, Ordering::Relaxed);
        self.resets.store(0, Ordering::Relaxed);
    }
}
