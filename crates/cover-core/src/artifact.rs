//! Run artifacts on disk.
//!
//! Layout: `<dir>/<run_id>/<name>.json` plus `<name>.digest`, the SHA-256 hex
//! of the JSON bytes. Reading verifies the digest.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// SHA-256 hex digest of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `value` as pretty JSON with its digest sidecar. Returns the JSON path.
pub fn write_json_artifact<T: Serialize>(
    dir: &Path,
    run_id: &str,
    name: &str,
    value: &T,
) -> Result<PathBuf> {
    let run_dir = dir.join(run_id);
    std::fs::create_dir_all(&run_dir)?;

    let artifact_path = run_dir.join(format!("{name}.json"));
    let digest_path = run_dir.join(format!("{name}.digest"));
    let json = serde_json::to_vec_pretty(value)?;

    std::fs::write(&artifact_path, &json)?;
    std::fs::write(&digest_path, content_digest(&json).as_bytes())?;

    Ok(artifact_path)
}

/// Read back an artifact written by [`write_json_artifact`].
pub fn read_json_artifact<T: DeserializeOwned>(dir: &Path, run_id: &str, name: &str) -> Result<T> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join(format!("{name}.json")))?;
    let expected = std::fs::read_to_string(run_dir.join(format!("{name}.digest")))?;

    let actual = content_digest(&json);
    if expected.trim() != actual {
        return Err(CoreError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}
