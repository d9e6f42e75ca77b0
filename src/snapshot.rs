use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::tree::TreeNode;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to write snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk shape of a persisted tree snapshot.
#[derive(Debug, Serialize)]
struct TreeSnapshot<'a> {
    workspace: &'a str,
    repository: &'a str,
    branch: &'a str,
    timestamp: String,
    structure: &'a TreeNode,
}

/// Write a fetched tree to `path` as pretty-printed JSON with an RFC 3339
/// timestamp.
pub fn save_tree_snapshot(
    path: &Path,
    workspace: &str,
    repository: &str,
    branch: &str,
    structure: &TreeNode,
) -> Result<(), SnapshotError> {
    let snapshot = TreeSnapshot {
        workspace,
        repository,
        branch,
        timestamp: Utc::now().to_rfc3339(),
        structure,
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, json)?;
    info!(path = %path.display(), "tree snapshot saved");
    Ok(())
}
