//! Source transforms shared by every target
//!
//! This module handles:
//! - Style Transform: CSS downleveling with mechanical pre/post passes ([`css`])
//! - Script Transform: JS downleveling and comment stripping ([`js`])
//! - Keyword obfuscation for the most constrained target ([`obfuscate`])
//! - HTML/CSS/JS minification ([`minify`])
//!
//! Every transform here is total: engine failures degrade to the best
//! available output and are reported through [`Transformed::fell_back`].

pub mod css;
pub mod js;
pub mod minify;
pub mod obfuscate;

pub use css::{CssEngine, LightningCss};
pub use js::{JsEngine, JsSource, OxcEngine};
pub use obfuscate::ObfuscationTable;

/// Output of a best-effort transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Transformed (or passed-through) source
    pub code: String,

    /// Why the engine step was skipped, if it was
    pub fallback: Option<String>,
}

impl Transformed {
    pub fn ok(code: String) -> Self {
        Self {
            code,
            fallback: None,
        }
    }

    pub fn fallback(code: String, reason: impl Into<String>) -> Self {
        Self {
            code,
            fallback: Some(reason.into()),
        }
    }

    pub fn fell_back(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Engines used by every transform in a build run
pub struct Engines {
    pub css: Box<dyn CssEngine>,
    pub js: Box<dyn JsEngine>,
    pub obfuscation: ObfuscationTable,
}

impl Default for Engines {
    fn default() -> Self {
        Self {
            css: Box::new(LightningCss),
            js: Box::new(OxcEngine),
            obfuscation: ObfuscationTable::default(),
        }
    }
}
