//! hf-output: visualization sinks and run records.

pub mod glvis;
pub mod hash;
pub mod manifest;
pub mod mfem;
pub mod paraview;

pub use glvis::GlvisStream;
pub use hash::compute_run_id;
pub use manifest::{RunKind, RunManifest, load_manifest, write_manifest};
pub use paraview::ParaViewCollection;

pub type OutputResult<T> = Result<T, OutputError>;

#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field '{name}' has {actual} values, space has {expected} dofs")]
    FieldSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Manifest not found in {dir}")]
    ManifestNotFound { dir: String },
}
