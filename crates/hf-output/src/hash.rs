//! Content-based hashing for run ids.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::OutputResult;

/// SHA-256 over the serialized config, the run kind and the program version.
pub fn compute_run_id<C: Serialize>(config: &C, kind: &str, version: &str) -> OutputResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(config)?.as_bytes());
    hasher.update(kind.as_bytes());
    hasher.update(version.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Config {
        order: usize,
        dt: f64,
    }

    #[test]
    fn hash_stability() {
        let config = Config { order: 1, dt: 1e-3 };
        let a = compute_run_id(&config, "heat", "v1").unwrap();
        let b = compute_run_id(&config, "heat", "v1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = compute_run_id(&Config { order: 1, dt: 1e-3 }, "heat", "v1").unwrap();
        let b = compute_run_id(&Config { order: 2, dt: 1e-3 }, "heat", "v1").unwrap();
        let c = compute_run_id(&Config { order: 1, dt: 1e-3 }, "poisson", "v1").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
