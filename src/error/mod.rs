//! Error types and handling for retrobuild
//!
//! Uses `thiserror` for error definitions and `miette` for diagnostics.
//!
//! Only run-fatal conditions surface as [`BuildError`]. Per-unit failures
//! (one page, one stylesheet, one library fetch) are caught where they happen,
//! logged, and recorded in the build report instead.

use miette::Diagnostic;
use thiserror::Error;


/// Main error type for retrobuild operations
#[derive(Error, Diagnostic, Debug)]
pub enum BuildError {
    // Configuration errors
    #[error("Failed to read configuration file: {path}")]
    #[diagnostic(code(retrobuild::config::read_failed))]
    ConfigReadFailed { path: String, reason: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(
        code(retrobuild::config::parse_failed),
        help("Check retrobuild.yaml against `retrobuild targets` output")
    )]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(retrobuild::config::invalid))]
    ConfigInvalid { message: String },

    #[error("Unknown target: {name}")]
    #[diagnostic(
        code(retrobuild::config::unknown_target),
        help("Valid targets: main, lite, legacy")
    )]
    UnknownTarget { name: String },

    #[error("Unknown shell: {name}")]
    #[diagnostic(
        code(retrobuild::cli::unknown_shell),
        help("Supported shells: bash, elvish, fish, powershell, zsh")
    )]
    UnknownShell { name: String },

    // Source tree errors
    #[error("Source directory not found: {path}")]
    #[diagnostic(code(retrobuild::source::not_found))]
    SourceNotFound { path: String },

    // Output tree errors
    #[error("Failed to prepare output root {path}: {reason}")]
    #[diagnostic(code(retrobuild::output::root_failed))]
    OutputRootFailed { path: String, reason: String },

    #[error("Failed to copy {from} to {to}: {reason}")]
    #[diagnostic(
        code(retrobuild::output::copy_failed),
        help("Replication is all-or-nothing; the staging tree was removed")
    )]
    CopyFailed {
        from: String,
        to: String,
        reason: String,
    },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(retrobuild::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(retrobuild::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(retrobuild::fs::io_error))]
    IoError { message: String },

    // Transform errors (per unit, normally caught before reaching the CLI)
    #[error("Failed to fetch {url}: {reason}")]
    #[diagnostic(code(retrobuild::vendor::fetch_failed))]
    FetchFailed { url: String, reason: String },

    #[error("HTML rewrite failed: {reason}")]
    #[diagnostic(code(retrobuild::page::rewrite_failed))]
    HtmlRewriteFailed { reason: String },

    #[error("CSS transform failed: {reason}")]
    #[diagnostic(code(retrobuild::transform::css_failed))]
    CssTransformFailed { reason: String },

    #[error("JS transform failed: {reason}")]
    #[diagnostic(code(retrobuild::transform::js_failed))]
    JsTransformFailed { reason: String },

    #[error("Failed to write report: {reason}")]
    #[diagnostic(code(retrobuild::report::write_failed))]
    ReportFailed { reason: String },
}

impl BuildError {
    /// Read failure for `path`
    pub fn read(path: &std::path::Path, err: &std::io::Error) -> Self {
        BuildError::FileReadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Write failure for `path`
    pub fn write(path: &std::path::Path, err: &std::io::Error) -> Self {
        BuildError::FileWriteFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BuildError {
    fn from(err: serde_yaml::Error) -> Self {
        BuildError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::ReportFailed {
            reason: err.to_string(),
        }
    }
}

impl From<lol_html::errors::RewritingError> for BuildError {
    fn from(err: lol_html::errors::RewritingError) -> Self {
        BuildError::HtmlRewriteFailed {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for retrobuild operations
pub type Result<T> = std::result::Result<T, BuildError>;
