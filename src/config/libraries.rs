//! Library replacement rules
//!
//! Each rule matches a `<script src>` and resolves it to a remote URL plus the
//! local file name it is vendored under. The table is shared by every
//! downleveled target.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// A library replacement rule as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRule {
    /// Short name (e.g. "marked")
    pub name: String,

    /// Regular expression tested against the script `src`
    pub pattern: String,

    /// Fixed remote URL; when absent the matched `src` itself is fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Destination file name under `libs/`
    pub file: String,
}

impl LibraryRule {
    pub fn new(name: &str, pattern: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            url: None,
            file: file.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }
}

/// A rule match: what to fetch and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    pub name: String,
    pub url: String,
    pub file: String,
}

/// Compiled rule table
#[derive(Debug, Clone)]
pub struct LibraryMatcher {
    rules: Vec<(LibraryRule, Regex)>,
}

impl LibraryMatcher {
    /// Compile every rule; an invalid pattern is a configuration error
    pub fn new(rules: &[LibraryRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (rule.clone(), re))
                    .map_err(|e| BuildError::ConfigInvalid {
                        message: format!("library rule '{}': {}", rule.name, e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// First rule whose pattern matches `src`
    pub fn resolve(&self, src: &str) -> Option<ResolvedLibrary> {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(src))
            .map(|(rule, _)| ResolvedLibrary {
                name: rule.name.clone(),
                url: rule
                    .url
                    .clone()
                    .unwrap_or_else(|| absolute_url(src)),
                file: rule.file.clone(),
            })
    }
}

/// Protocol-relative and plain-http sources are fetched over https
fn absolute_url(src: &str) -> String {
    if let Some(rest) = src.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(rest) = src.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        src.to_string()
    }
}

/// Default library replacement table
pub fn default_libraries() -> Vec<LibraryRule> {
    vec![
        LibraryRule::new("marked", r"marked(@[\w.\-]+)?/.*\.js$", "marked.min.js")
            .with_url("https://cdn.jsdelivr.net/npm/marked@4.3.0/marked.min.js"),
        LibraryRule::new("dompurify", r"(?i)dompurify", "purify.min.js")
            .with_url("https://cdn.jsdelivr.net/npm/dompurify@2.5.6/dist/purify.min.js"),
        LibraryRule::new("jszip", r"jszip(@[\w.\-]+)?/.*\.js$", "jszip.min.js")
            .with_url("https://cdn.jsdelivr.net/npm/jszip@3.10.1/dist/jszip.min.js"),
        LibraryRule::new("chess", r"chess(\.js)?(@[\w.\-]+)?/.*\.js$", "chess.min.js")
            .with_url("https://cdn.jsdelivr.net/npm/chess.js@0.13.4/chess.min.js"),
        LibraryRule::new("highlight", r"highlight(\.js)?(@[\w.\-]+)?/.*\.js$", "highlight.min.js"),
        LibraryRule::new("tone", r"/tone(@[\w.\-]+)?/.*\.js$", "tone.min.js")
            .with_url("https://cdn.jsdelivr.net/npm/tone@14.7.77/build/Tone.js"),
    ]
}
