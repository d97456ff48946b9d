//! Minification
//!
//! CSS is collapsed with plain text passes that never reorder declarations;
//! quoted strings are masked first and come back untouched.
//! JS goes through the engine's strip mode. HTML is minified by `minify-html`
//! after its inline blocks were handled here, then a last pass drops any
//! comment the serializer kept.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::js::{JsEngine, JsSource};
use crate::error::Result;
use crate::html::{self, ScriptEdit};

static CSS_COMMENT_OR_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)/\*.*?\*/|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).expect("valid regex")
});

static MASKED_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x00(\d+)\x00").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static AROUND_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{};,>])\s*").expect("valid regex"));

static AFTER_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s+").expect("valid regex"));

/// `prop :value` inside a declaration block, up to the declaration end
static BEFORE_DECLARATION_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{;][-\w]+)\s+:([^{};]*[;}])").expect("valid regex"));

static BEFORE_IMPORTANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+!important").expect("valid regex"));

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

/// Collapse comments, whitespace and separators
pub fn minify_css(css: &str) -> String {
    let mut strings = Vec::new();
    let masked = CSS_COMMENT_OR_STRING.replace_all(css, |caps: &Captures| {
        let token = &caps[0];
        if token.starts_with("/*") {
            String::new()
        } else {
            strings.push(token.to_string());
            format!("\x00{}\x00", strings.len() - 1)
        }
    });

    let out = WHITESPACE.replace_all(&masked, " ");
    let out = AROUND_PUNCTUATION.replace_all(&out, "$1");
    let mut out = AFTER_COLON.replace_all(&out, ":").into_owned();
    // matches consume the declaration end, so adjacent declarations need another pass
    loop {
        let next = BEFORE_DECLARATION_COLON.replace_all(&out, "$1:$2").into_owned();
        if next == out {
            break;
        }
        out = next;
    }
    let out = BEFORE_IMPORTANT.replace_all(&out, "!important");
    let out = out.replace(";}", "}");

    MASKED_STRING
        .replace_all(out.trim(), |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| strings.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

/// Strip comments and whitespace; the input is returned on parse failure
pub fn minify_js(engine: &dyn JsEngine, code: &str, source: JsSource) -> String {
    match engine.strip(code, source) {
        Ok(out) => out,
        Err(e) => {
            tracing::debug!(error = %e, "js minify failed, keeping original");
            code.to_string()
        }
    }
}

/// Minify a whole document, inline scripts and styles included
pub fn minify_html(engine: &dyn JsEngine, document: &str) -> Result<String> {
    let with_scripts = html::edit_scripts(document, |block| {
        if !block.is_inline() || !block.is_javascript() || block.content.trim().is_empty() {
            return ScriptEdit::Keep;
        }
        let source = if block.is_module() {
            JsSource::Module
        } else {
            JsSource::Script
        };
        ScriptEdit::Replace {
            content: minify_js(engine, &block.content, source),
            strip_type: false,
        }
    })?;
    let with_styles = html::edit_styles(&with_scripts, |block| Some(minify_css(&block.content)))?;

    let cfg = minify_html::Cfg {
        minify_css: false,
        minify_js: false,
        keep_closing_tags: true,
        keep_html_and_head_opening_tags: true,
        ..minify_html::Cfg::default()
    };
    let minified = minify_html::minify(with_styles.as_bytes(), &cfg);
    let minified = String::from_utf8_lossy(&minified);

    Ok(strip_html_comments(&minified))
}

/// Remove `<!-- ... -->` from serialized markup
///
/// Text-level: comment-like content inside `<pre>` or scripts is removed too.
pub fn strip_html_comments(markup: &str) -> String {
    HTML_COMMENT.replace_all(markup, "").into_owned()
}
