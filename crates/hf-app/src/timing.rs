//! Wall-clock summary of a run, read from the shared phase timers.

use hf_core::timing::{self, phase_timing};
use serde::{Deserialize, Serialize};

/// Concise timing summary for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTimingSummary {
    pub element_matrices_time_s: f64,
    pub sparse_assembly_time_s: f64,
    pub load_assembly_time_s: f64,
    pub linear_solve_time_s: f64,
    pub linear_solve_count: u64,
    pub total_time_s: f64,
}

impl RunTimingSummary {
    /// Snapshot of the phase timers plus the run's total wall time.
    pub fn collect(total_time_s: f64) -> Self {
        Self {
            element_matrices_time_s: phase_timing::ELEMENT_MATRICES.total_seconds(),
            sparse_assembly_time_s: phase_timing::SPARSE_ASSEMBLY.total_seconds(),
            load_assembly_time_s: phase_timing::LOAD_ASSEMBLY.total_seconds(),
            linear_solve_time_s: phase_timing::LINEAR_SOLVES.total_seconds(),
            linear_solve_count: phase_timing::LINEAR_SOLVES.count(),
            total_time_s,
        }
    }

    pub fn assembly_time_s(&self) -> f64 {
        self.element_matrices_time_s + self.sparse_assembly_time_s + self.load_assembly_time_s
    }
}

/// Per-phase call counts and mean times for verbose reporting.
pub fn phase_breakdown() -> Vec<String> {
    phase_timing::summary_lines()
}

/// Reset the phase timers and switch collection on for a new run.
pub(crate) fn begin_run() {
    timing::enable_timing();
    phase_timing::reset_all();
}
