//! Target profiles
//!
//! A [`TargetProfile`] describes one browser-capability tier. The three
//! profiles are built once per run from configuration and never mutated.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Identity of a build target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetId {
    Main,
    Lite,
    Legacy,
}

impl TargetId {
    /// All targets in build order
    pub const ALL: [TargetId; 3] = [TargetId::Main, TargetId::Lite, TargetId::Legacy];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetId::Main => "main",
            TargetId::Lite => "lite",
            TargetId::Legacy => "legacy",
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetId {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(TargetId::Main),
            "lite" => Ok(TargetId::Lite),
            "legacy" => Ok(TargetId::Legacy),
            _ => Err(BuildError::UnknownTarget {
                name: s.to_string(),
            }),
        }
    }
}

/// Minimum supported browser, as understood by the CSS and JS engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinBrowser {
    /// Browserslist query fed to the CSS engine (e.g. "safari 9")
    pub browsers: String,

    /// ECMAScript target fed to the JS engine (e.g. "es2015")
    pub es_target: String,
}

impl MinBrowser {
    pub fn new(browsers: impl Into<String>, es_target: impl Into<String>) -> Self {
        Self {
            browsers: browsers.into(),
            es_target: es_target.into(),
        }
    }
}

/// A remote polyfill bundle injected into every page of a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polyfill {
    pub url: String,
    pub file: String,
}

impl Polyfill {
    pub fn new(url: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file: file.into(),
        }
    }
}

/// A browser-capability build target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Target identity
    pub id: TargetId,

    /// Output directory name, relative to the build output directory
    pub dir: String,

    /// Public domain used for sitemap locations
    pub domain: String,

    /// Minimum supported browser; `None` means no downleveling at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_browser: Option<MinBrowser>,

    /// Apply keyword obfuscation to transformed scripts
    #[serde(default)]
    pub obfuscate: bool,

    /// Declare `display:-webkit-box` before every `display:flex`
    #[serde(default)]
    pub legacy_flex_prefix: bool,

    /// Run every JS syntax transform regardless of the target
    #[serde(default)]
    pub force_all_transforms: bool,

    /// Polyfill bundles vendored and prepended to `<head>`
    #[serde(default)]
    pub polyfills: Vec<Polyfill>,
}

impl TargetProfile {
    /// Create a profile with no downleveling
    pub fn new(id: TargetId, dir: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id,
            dir: dir.into(),
            domain: domain.into(),
            min_browser: None,
            obfuscate: false,
            legacy_flex_prefix: false,
            force_all_transforms: false,
            polyfills: Vec::new(),
        }
    }

    pub fn with_min_browser(mut self, min_browser: MinBrowser) -> Self {
        self.min_browser = Some(min_browser);
        self
    }

    pub fn with_obfuscation(mut self) -> Self {
        self.obfuscate = true;
        self
    }

    pub fn with_legacy_flex_prefix(mut self) -> Self {
        self.legacy_flex_prefix = true;
        self
    }

    pub fn with_all_transforms(mut self) -> Self {
        self.force_all_transforms = true;
        self
    }

    pub fn with_polyfill(mut self, polyfill: Polyfill) -> Self {
        self.polyfills.push(polyfill);
        self
    }

    /// Whether this target is downleveled at all
    pub fn is_downleveled(&self) -> bool {
        self.min_browser.is_some()
    }

    /// Output root for this target under `out_dir`
    pub fn root(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(&self.dir)
    }
}

const CORE_JS: &str = "https://cdn.jsdelivr.net/npm/core-js-bundle@3.37.1/minified.js";
const REGENERATOR: &str =
    "https://cdn.jsdelivr.net/npm/regenerator-runtime@0.14.1/runtime.min.js";
const URL_SEARCH_PARAMS: &str =
    "https://cdn.jsdelivr.net/npm/url-search-params-polyfill@8.2.5/index.min.js";
const WHATWG_FETCH: &str = "https://cdn.jsdelivr.net/npm/whatwg-fetch@3.6.20/dist/fetch.umd.min.js";

/// Default target profile table
pub fn default_profiles() -> Vec<TargetProfile> {
    vec![
        TargetProfile::new(TargetId::Main, "main", "https://retro-os.app"),
        TargetProfile::new(TargetId::Lite, "lite", "https://lite.retro-os.app")
            .with_min_browser(MinBrowser::new("safari 10", "es2015"))
            .with_polyfill(Polyfill::new(REGENERATOR, "regenerator-runtime.min.js"))
            .with_polyfill(Polyfill::new(CORE_JS, "core-js.min.js"))
            .with_polyfill(Polyfill::new(URL_SEARCH_PARAMS, "url-search-params.min.js")),
        TargetProfile::new(TargetId::Legacy, "legacy", "https://legacy.retro-os.app")
            .with_min_browser(MinBrowser::new("safari 6", "es2015"))
            .with_obfuscation()
            .with_legacy_flex_prefix()
            .with_all_transforms()
            .with_polyfill(Polyfill::new(REGENERATOR, "regenerator-runtime.min.js"))
            .with_polyfill(Polyfill::new(CORE_JS, "core-js.min.js"))
            .with_polyfill(Polyfill::new(URL_SEARCH_PARAMS, "url-search-params.min.js"))
            .with_polyfill(Polyfill::new(WHATWG_FETCH, "fetch.umd.min.js")),
    ]
}
