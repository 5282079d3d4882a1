use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStage {
    BuildingMesh,
    AssemblingOperators,
    RunningTransient,
    SolvingLevel,
    Visualizing,
    SavingResults,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            RunStage::BuildingMesh => "building mesh",
            RunStage::AssemblingOperators => "assembling",
            RunStage::RunningTransient => "time stepping",
            RunStage::SolvingLevel => "solving level",
            RunStage::Visualizing => "visualizing",
            RunStage::SavingResults => "saving",
            RunStage::Completed => "done",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransientProgress {
    pub sim_time_s: f64,
    pub t_end_s: f64,
    pub fraction_complete: f64,
    pub step: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LevelProgress {
    /// 1-based refinement level
    pub level: usize,
    pub levels: usize,
    pub dofs: usize,
    pub l2_error: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub transient: Option<TransientProgress>,
    pub level: Option<LevelProgress>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            transient: None,
            level: None,
        }
    }
}

/// Optional progress callback threaded through a run.
pub type ProgressCallback<'a> = Option<&'a mut dyn FnMut(RunProgressEvent)>;

pub(crate) fn emit_progress(
    progress_cb: &mut ProgressCallback<'_>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    transient: Option<TransientProgress>,
    level: Option<LevelProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            transient,
            level,
        });
    }
}
