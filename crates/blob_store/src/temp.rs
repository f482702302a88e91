//! Sandboxed temp files for downloaded blobs.
//!
//! Temp paths are derived deterministically from the blob identifier.
//! Identifiers are restricted to a safe charset before any path is
//! constructed, and resolved paths must stay inside the sandbox root.
//! Cleanup is guaranteed through a Drop guard on success and failure
//! paths alike.

use std::path::{Path, PathBuf};

use crate::{Result, StoreError};

/// Accept only identifiers that cannot influence path resolution.
pub fn validate_blob_id(blob_id: &str) -> Result<()> {
    if blob_id.is_empty() || blob_id.len() > 128 {
        return Err(StoreError::InvalidBlobId(blob_id.to_string()));
    }
    let ok = blob_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok || blob_id.contains("..") || blob_id.starts_with('.') {
        return Err(StoreError::InvalidBlobId(blob_id.to_string()));
    }
    Ok(())
}

/// Per-process sandbox directory for downloaded blob content.
#[derive(Clone, Debug)]
pub struct TempSandbox {
    root: PathBuf,
}

impl TempSandbox {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic temp path for a blob id, validated against traversal.
    pub fn path_for(&self, blob_id: &str) -> Result<PathBuf> {
        validate_blob_id(blob_id)?;
        let candidate = self.root.join(blob_id);
        // Charset validation already forbids separators; this is the
        // containment backstop for the resolved path.
        if !candidate.starts_with(&self.root) {
            return Err(StoreError::InvalidBlobId(blob_id.to_string()));
        }
        Ok(candidate)
    }

    /// Write blob content to its sandboxed path, returning a guard that
    /// removes the file on drop.
    pub async fn write(&self, blob_id: &str, content: &[u8]) -> Result<TempFileGuard> {
        let path = self.path_for(blob_id)?;
        tokio::fs::write(&path, content).await?;
        Ok(TempFileGuard { path })
    }
}

/// Removes the underlying temp file when dropped.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove temp file {}: {}", self.path.display(), e);
            }
        }
    }
}
