//! Build report
//!
//! One entry per processed file per target, written as JSON next to the
//! target roots.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::TargetId;
use crate::error::{BuildError, Result};

/// Report file name inside the output directory
pub const REPORT_FILE_NAME: &str = "build-report.json";

/// Outcome of processing one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    TransformedWithFallback,
    PassedThroughOnError,
}

impl FileStatus {
    pub fn from_fallback(fell_back: bool) -> Self {
        if fell_back {
            FileStatus::TransformedWithFallback
        } else {
            FileStatus::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub target: TargetId,

    /// Path relative to the target root, `/`-separated
    pub path: String,

    pub status: FileStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub targets: Vec<TargetId>,
    pub files: Vec<FileReport>,

    /// Run-level warnings from non-fatal tail stages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BuildReport {
    pub fn new(targets: Vec<TargetId>) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    pub fn record(
        &mut self,
        target: TargetId,
        path: &Path,
        status: FileStatus,
        warnings: Vec<String>,
    ) {
        self.files.push(FileReport {
            target,
            path: path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            status,
            warnings,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn count(&self, target: TargetId, status: FileStatus) -> usize {
        self.files
            .iter()
            .filter(|f| f.target == target && f.status == status)
            .count()
    }

    pub fn write(&self, out_dir: &Path) -> Result<()> {
        fs::create_dir_all(out_dir).map_err(|e| BuildError::ReportFailed {
            reason: e.to_string(),
        })?;
        let json = serde_json::to_string_pretty(self)?;
        let path = out_dir.join(REPORT_FILE_NAME);
        fs::write(&path, json).map_err(|e| BuildError::ReportFailed {
            reason: format!("{}: {e}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&FileStatus::PassedThroughOnError).unwrap();
        assert_eq!(json, "\"passed_through_on_error\"");
    }

    #[test]
    fn test_record_and_count() {
        let mut report = BuildReport::new(vec![TargetId::Lite, TargetId::Legacy]);
        report.record(
            TargetId::Lite,
            Path::new("apps/chess/index.html"),
            FileStatus::Ok,
            Vec::new(),
        );
        report.record(
            TargetId::Legacy,
            Path::new("index.html"),
            FileStatus::TransformedWithFallback,
            vec!["badge anchor missing".to_string()],
        );

        assert_eq!(report.files[0].path, "apps/chess/index.html");
        assert_eq!(report.count(TargetId::Lite, FileStatus::Ok), 1);
        assert_eq!(report.count(TargetId::Legacy, FileStatus::Ok), 0);
    }

    #[test]
    fn test_write_report() {
        let temp = TempDir::new().unwrap();
        let mut report = BuildReport::new(vec![TargetId::Main]);
        report.record(TargetId::Main, Path::new("a.css"), FileStatus::Ok, Vec::new());
        report.warn("sitemap failed");
        report.write(temp.path()).unwrap();

        let raw = fs::read_to_string(temp.path().join(REPORT_FILE_NAME)).unwrap();
        let parsed: BuildReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, report);
        assert!(!raw.contains("\"warnings\": []"));
    }
}
