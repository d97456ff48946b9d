//! Staged output roots
//!
//! A target root is first populated in a sibling staging directory and only
//! renamed into place once the copy has fully succeeded. If the guard is
//! dropped without being committed, the staging tree is removed, so a failed
//! copy never leaves a half-populated target root behind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Staging directory for one output root
#[derive(Debug)]
pub struct StagedRoot {
    /// Final location of the output root
    target: PathBuf,

    /// Sibling directory being populated
    staging: PathBuf,

    /// Whether the staging tree has been moved into place
    committed: bool,
}

impl StagedRoot {
    /// Create an empty staging directory next to `target`
    pub fn begin(target: &Path) -> Result<Self> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "out".to_string());
        let staging = parent.join(format!(".{}.staging-{}", name, std::process::id()));

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| root_failed(&staging, &e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| root_failed(&staging, &e))?;

        Ok(Self {
            target: target.to_path_buf(),
            staging,
            committed: false,
        })
    }

    /// Directory to copy into
    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// Move the staging tree into place, replacing any previous root
    pub fn commit(mut self) -> Result<PathBuf> {
        if self.target.exists() {
            fs::remove_dir_all(&self.target).map_err(|e| root_failed(&self.target, &e))?;
        }
        fs::rename(&self.staging, &self.target).map_err(|e| root_failed(&self.target, &e))?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for StagedRoot {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            if let Err(e) = fs::remove_dir_all(&self.staging) {
                tracing::warn!(
                    path = %self.staging.display(),
                    error = %e,
                    "failed to remove staging directory"
                );
            }
        }
    }
}

fn root_failed(path: &Path, err: &std::io::Error) -> BuildError {
    BuildError::OutputRootFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
