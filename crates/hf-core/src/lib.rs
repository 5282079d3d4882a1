//! hf-core: shared foundation for heatflow.
//!
//! Contains:
//! - timing (wall-clock timers for assembly and solve phases)

pub mod timing;
