//! Run manifest written next to the output of every run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{OutputError, OutputResult};

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub version: String,
    pub kind: RunKind,
    pub dofs: usize,
    pub l2_error: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunKind {
    Heat {
        dt: f64,
        t_final: f64,
        steps: usize,
        cycle: u64,
    },
    Elliptic {
        levels: usize,
    },
}

impl RunManifest {
    /// Manifest stamped with the current UTC time.
    pub fn new(run_id: String, version: &str, kind: RunKind, dofs: usize, l2_error: Option<f64>) -> Self {
        Self {
            run_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: version.to_string(),
            kind,
            dofs,
            l2_error,
        }
    }
}

pub fn write_manifest(dir: &Path, manifest: &RunManifest) -> OutputResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(MANIFEST_FILE);
    fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
    Ok(path)
}

pub fn load_manifest(dir: &Path) -> OutputResult<RunManifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(OutputError::ManifestNotFound {
            dir: dir.display().to_string(),
        });
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}
