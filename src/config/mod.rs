//! Build configuration
//!
//! This module handles:
//! - Built-in defaults for targets, libraries, and the ignore list
//! - Optional `retrobuild.yaml` overrides at the source root
//! - Validation of the resolved configuration

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

pub mod libraries;
pub mod profile;

pub use libraries::{LibraryMatcher, LibraryRule, ResolvedLibrary};
pub use profile::{MinBrowser, Polyfill, TargetId, TargetProfile};

/// Configuration file name looked up at the source root
pub const CONFIG_FILE_NAME: &str = "retrobuild.yaml";

/// Top-level names never replicated into output trees
const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".github",
    ".gitignore",
    ".wrangler",
    "node_modules",
    "scripts",
    "workers",
    "functions",
    "screenshots",
    "build-automation.js",
    "package.json",
    "package-lock.json",
    "firebase.json",
    ".firebaserc",
    "wrangler.toml",
    "_redirects",
    "README.md",
];

/// Substrings identifying cross-target redirect scripts
const DEFAULT_REDIRECT_SENTINELS: &[&str] = &[
    "lite.retro-os.app",
    "legacy.retro-os.app",
    "checkBrowserSupport(",
    "redirectToLite",
];

/// Resolved build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory holding one root per target, relative to the source root
    pub out_dir: PathBuf,

    /// Top-level entries excluded from replication
    pub ignore: Vec<String>,

    /// Target profile table
    pub targets: Vec<TargetProfile>,

    /// Library replacement rules shared by downleveled targets
    pub libraries: Vec<LibraryRule>,

    /// Inline scripts containing any of these are removed from downleveled pages
    pub redirect_sentinels: Vec<String>,

    /// CSS selector of the element the build badge is inserted after
    pub badge_anchor: String,

    /// Timeout for a single library fetch
    pub fetch_timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist"),
            ignore: DEFAULT_IGNORE.iter().map(ToString::to_string).collect(),
            targets: profile::default_profiles(),
            libraries: libraries::default_libraries(),
            redirect_sentinels: DEFAULT_REDIRECT_SENTINELS
                .iter()
                .map(ToString::to_string)
                .collect(),
            badge_anchor: "header".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

impl BuildConfig {
    /// Load configuration for a source root
    ///
    /// An explicit path must exist. Without one, `retrobuild.yaml` at the
    /// source root is used when present, otherwise the built-in defaults.
    pub fn load(source_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let candidate = source_root.join(CONFIG_FILE_NAME);
                candidate.is_file().then_some(candidate)
            }
        };

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BuildError::ConfigReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| BuildError::ConfigParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Check target table and library patterns
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut dirs = HashSet::new();

        for target in &self.targets {
            if !seen.insert(target.id) {
                return Err(BuildError::ConfigInvalid {
                    message: format!("duplicate target '{}'", target.id),
                });
            }
            if target.dir.trim().is_empty() || !dirs.insert(target.dir.clone()) {
                return Err(BuildError::ConfigInvalid {
                    message: format!("target '{}' needs a unique output dir", target.id),
                });
            }
        }

        if self.out_dir.as_os_str().is_empty() {
            return Err(BuildError::ConfigInvalid {
                message: "out_dir must not be the source root".to_string(),
            });
        }

        if let Some(missing) = TargetId::ALL.iter().find(|id| !seen.contains(id)) {
            return Err(BuildError::ConfigInvalid {
                message: format!("missing target '{missing}'"),
            });
        }

        if self.badge_anchor.parse::<lol_html::Selector>().is_err() {
            return Err(BuildError::ConfigInvalid {
                message: format!("badge_anchor '{}' is not a valid selector", self.badge_anchor),
            });
        }

        LibraryMatcher::new(&self.libraries)?;
        Ok(())
    }

    /// Profile for a target id
    pub fn target(&self, id: TargetId) -> Option<&TargetProfile> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Absolute output directory for a source root
    pub fn out_dir(&self, source_root: &Path) -> PathBuf {
        if self.out_dir.is_absolute() {
            self.out_dir.clone()
        } else {
            source_root.join(&self.out_dir)
        }
    }

    /// Ignore set including the output directory and the config file itself
    pub fn effective_ignore(&self) -> Vec<String> {
        let mut ignore = self.ignore.clone();
        if let Some(first) = self.out_dir.components().next() {
            let name = first.as_os_str().to_string_lossy().to_string();
            if !self.out_dir.is_absolute() && !ignore.contains(&name) {
                ignore.push(name);
            }
        }
        if !ignore.iter().any(|i| i == CONFIG_FILE_NAME) {
            ignore.push(CONFIG_FILE_NAME.to_string());
        }
        ignore
    }
}
