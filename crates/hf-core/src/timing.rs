//! Lightweight performance timing utilities.
//!
//! Phase timers accumulate wall time for assembly and linear solves across a
//! run. Collection can be switched on programmatically or with the
//! `HF_TIMING` environment variable.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var_os("HF_TIMING").is_some()
}

/// Wall-clock stopwatch for one phase invocation.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stop and charge the elapsed time to `phase` when timing is enabled.
    /// Returns the elapsed seconds.
    pub fn stop_into(self, phase: &PhaseTimer) -> f64 {
        let elapsed = self.start.elapsed();
        if is_enabled() {
            phase.record(elapsed);
        }
        elapsed.as_secs_f64()
    }
}

/// Lock-free running total of the time spent in one phase.
pub struct PhaseTimer {
    nanos: AtomicU64,
    calls: AtomicU64,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    pub const fn new() -> Self {
        Self {
            nanos: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    pub fn total_seconds(&self) -> f64 {
        self.total().as_secs_f64()
    }

    pub fn count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Mean seconds per call, 0 before the first call.
    pub fn mean_seconds(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.total_seconds() / n as f64,
        }
    }

    pub fn reset(&self) {
        self.nanos.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }
}

/// Per-phase accumulators shared by the discretization and solver crates.
pub mod phase_timing {
    use super::PhaseTimer;

    /// Element matrix evaluation (quadrature loops)
    pub static ELEMENT_MATRICES: PhaseTimer = PhaseTimer::new();
    /// Scatter of element matrices into CSR storage
    pub static SPARSE_ASSEMBLY: PhaseTimer = PhaseTimer::new();
    /// Load vector assembly
    pub static LOAD_ASSEMBLY: PhaseTimer = PhaseTimer::new();
    /// Iterative and direct linear solves
    pub static LINEAR_SOLVES: PhaseTimer = PhaseTimer::new();

    const PHASES: [(&str, &PhaseTimer); 4] = [
        ("element matrices", &ELEMENT_MATRICES),
        ("sparse assembly", &SPARSE_ASSEMBLY),
        ("load assembly", &LOAD_ASSEMBLY),
        ("linear solves", &LINEAR_SOLVES),
    ];

    pub fn reset_all() {
        for (_, phase) in PHASES {
            phase.reset();
        }
    }

    /// One formatted line per phase that saw at least one call.
    pub fn summary_lines() -> Vec<String> {
        PHASES
            .iter()
            .filter(|(_, phase)| phase.count() > 0)
            .map(|(label, phase)| {
                format!(
                    "{label:<18} {:>7} calls {:>9.3}s total {:>9.4}ms mean",
                    phase.count(),
                    phase.total_seconds(),
                    phase.mean_seconds() * 1e3
                )
            })
            .collect()
    }
}
