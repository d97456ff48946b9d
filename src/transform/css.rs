//! Style Transform
//!
//! Downgrades a CSS fragment for a target's minimum browser. The feature
//! level work is delegated to a [`CssEngine`]; everything around it is
//! mechanical text rewriting that has to survive minification.

#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::LazyLock;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::{Captures, Regex};

use super::Transformed;
use super::minify::minify_css;
use crate::config::TargetProfile;
use crate::error::{BuildError, Result};

/// Feature-level CSS downleveling engine
pub trait CssEngine {
    /// Rewrite `css` for the browsers matched by the browserslist `query`
    fn downgrade(&self, css: &str, query: &str) -> Result<String>;
}

/// [`CssEngine`] backed by lightningcss
pub struct LightningCss;

impl CssEngine for LightningCss {
    fn downgrade(&self, css: &str, query: &str) -> Result<String> {
        let browsers = Browsers::from_browserslist([query]).map_err(css_failed)?;
        let targets = Targets {
            browsers,
            ..Targets::default()
        };

        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions {
                error_recovery: true,
                ..ParserOptions::default()
            },
        )
        .map_err(css_failed)?;

        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(css_failed)?;

        let printed = sheet
            .to_css(PrinterOptions {
                targets,
                ..PrinterOptions::default()
            })
            .map_err(css_failed)?;

        Ok(printed.code)
    }
}

fn css_failed(err: impl std::fmt::Display) -> BuildError {
    BuildError::CssTransformFailed {
        reason: err.to_string(),
    }
}

static VIEWPORT_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d*\.?\d+)\s*(?:dvh|lvh|svh)\b").expect("viewport unit regex")
});
static VIEWPORT_WIDTH_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d*\.?\d+)\s*(?:dvw|lvw|svw)\b").expect("viewport width regex")
});
static TEXT_WRAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"text-wrap(?:-style)?\s*:\s*(?:balance|pretty)\s*(?:!important)?\s*;?")
        .expect("text-wrap regex")
});
static FLEX_DISPLAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:display\s*:\s*-(?:webkit|moz|ms)-(?:box|flex|flexbox)\s*(?:!important)?\s*;\s*)*display\s*:\s*flex\b(\s*!important)?",
    )
    .expect("flex display regex")
});
static GRID_DISPLAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"display\s*:\s*(inline-)?grid\b(\s*!important)?").expect("grid display regex")
});
static ROOT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":root\s*\{([^}]*)\}").expect("root block regex"));
static CUSTOM_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(--[A-Za-z0-9_-]+)\s*:\s*([^;]+)").expect("custom property regex")
});
static VAR_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\(\s*(--[A-Za-z0-9_-]+)\s*(?:,\s*([^()]*(?:\([^()]*\)[^()]*)*))?\)")
        .expect("var reference regex")
});
static CUSTOM_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<lead>[{;])\s*--[A-Za-z0-9_-]+\s*:[^;{}]*;?").expect("declaration regex")
});
static UNRESOLVED_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<lead>[{;])[^;{}]*var\(\s*--[^;{}]*;?").expect("unresolved regex")
});
static EMPTY_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^{};]+\{\s*\}").expect("empty rule regex"));

/// Passes are repeated until stable, bounded by this depth
const MAX_PASSES: usize = 8;

/// Run the full Style Transform for a downleveled profile
pub fn transform_css(engine: &dyn CssEngine, css: &str, profile: &TargetProfile) -> Transformed {
    let fixed = mechanical_fixups(css);
    let resolved = substitute_root_variables(&fixed);

    let (downgraded, fallback) = match &profile.min_browser {
        Some(min) => match engine.downgrade(&resolved, &min.browsers) {
            Ok(code) => (code, None),
            Err(e) => {
                tracing::warn!(error = %e, "css engine failed, keeping pre-transform stylesheet");
                (resolved, Some(e.to_string()))
            }
        },
        None => (resolved, None),
    };

    let mut code = minify_css(&downgraded);
    if profile.legacy_flex_prefix {
        code = flex_fallback(&code);
    }
    code = grid_fallback(&code);
    code = strip_custom_properties(&code);

    match fallback {
        Some(reason) => Transformed::fallback(code, reason),
        None => Transformed::ok(code),
    }
}

/// Rewrite constructs the engine does not reliably downlevel
pub fn mechanical_fixups(css: &str) -> String {
    let css = VIEWPORT_UNITS.replace_all(css, "${1}vh");
    let css = VIEWPORT_WIDTH_UNITS.replace_all(&css, "${1}vw");
    TEXT_WRAP.replace_all(&css, "").into_owned()
}

/// Declare the legacy box model before every `display:flex`
///
/// Prefixed display declarations directly in front of the standard one are
/// folded into the canonical `display:-webkit-box;display:flex` pair, so the
/// pass is idempotent.
pub fn flex_fallback(css: &str) -> String {
    FLEX_DISPLAY
        .replace_all(css, |caps: &Captures<'_>| {
            let important = if caps.get(1).is_some() {
                "!important"
            } else {
                ""
            };
            format!("display:-webkit-box{important};display:flex{important}")
        })
        .into_owned()
}

/// Replace grid layouts with a wrapping flex layout
pub fn grid_fallback(css: &str) -> String {
    GRID_DISPLAY
        .replace_all(css, |caps: &Captures<'_>| {
            let inline = caps.get(1).map_or("", |m| m.as_str());
            let important = if caps.get(2).is_some() {
                "!important"
            } else {
                ""
            };
            format!("display:{inline}flex{important};flex-wrap:wrap")
        })
        .into_owned()
}

/// Collect `--name: value` pairs from every `:root` block
pub fn root_variables(css: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for block in ROOT_BLOCK.captures_iter(css) {
        for decl in CUSTOM_PROPERTY.captures_iter(&block[1]) {
            vars.insert(decl[1].to_string(), decl[2].trim().to_string());
        }
    }
    vars
}

/// Replace every `var(--x)` with the value declared in `:root`
///
/// Undefined names fall back to the `var()` fallback argument when one is
/// given; otherwise the reference is left for [`strip_custom_properties`].
pub fn substitute_root_variables(css: &str) -> String {
    if !css.contains("var(") {
        return css.to_string();
    }

    let vars = root_variables(css);
    let mut current = css.to_string();
    for _ in 0..MAX_PASSES {
        let next = VAR_REFERENCE
            .replace_all(&current, |caps: &Captures<'_>| {
                match (vars.get(&caps[1]), caps.get(2)) {
                    (Some(value), _) => value.clone(),
                    (None, Some(fallback)) => fallback.as_str().trim().to_string(),
                    (None, None) => caps[0].to_string(),
                }
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Drop custom-property declarations, unresolved `var()` uses, and the empty
/// rules they leave behind
pub fn strip_custom_properties(css: &str) -> String {
    let mut current = css.to_string();
    for _ in 0..MAX_PASSES {
        let next = CUSTOM_DECLARATION.replace_all(&current, "$lead");
        let next = UNRESOLVED_DECLARATION.replace_all(&next, "$lead");
        let next = EMPTY_RULE.replace_all(&next, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}
