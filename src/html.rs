//! Streaming HTML edits
//!
//! Thin helpers over `lol_html` covering what the page pipeline needs:
//! enumerating and rewriting `<script>`/`<style>` blocks, inserting markup at
//! an element, and editing attributes. Content-dependent edits take two
//! passes because `lol_html` sees an element's start tag before its text.

#![allow(clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::sync::LazyLock;

use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, element, rewrite_str, text};
use regex::Regex;

use crate::error::Result;

static SCRIPT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</script").expect("valid regex"));

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

/// A `<script>` element in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    pub index: usize,
    pub src: Option<String>,
    pub script_type: Option<String>,
    pub content: String,
}

impl ScriptBlock {
    pub fn is_inline(&self) -> bool {
        self.src.is_none()
    }

    pub fn is_module(&self) -> bool {
        self.script_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("module"))
    }

    /// Absent type, a JavaScript MIME type, or `module`
    pub fn is_javascript(&self) -> bool {
        match self.script_type.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(t) => {
                t.eq_ignore_ascii_case("text/javascript")
                    || t.eq_ignore_ascii_case("application/javascript")
                    || t.eq_ignore_ascii_case("module")
            }
        }
    }
}

/// What to do with one `<script>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEdit {
    Keep,
    Remove,
    SetSrc(String),
    Replace { content: String, strip_type: bool },
}

/// A `<style>` element in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock {
    pub index: usize,
    pub content: String,
}

/// Where inserted markup lands relative to the matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// After the start tag
    Prepend,
    /// Before the end tag
    Append,
    Before,
    After,
}

/// Which matching element receives an insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    First,
    Last,
}

/// All `<script>` elements with their raw text
pub fn scripts(html: &str) -> Result<Vec<ScriptBlock>> {
    let blocks = RefCell::new(Vec::new());
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    let mut blocks = blocks.borrow_mut();
                    let index = blocks.len();
                    blocks.push(ScriptBlock {
                        index,
                        src: el.get_attribute("src"),
                        script_type: el.get_attribute("type"),
                        content: String::new(),
                    });
                    Ok(())
                }),
                text!("script", |t| {
                    if let Some(last) = blocks.borrow_mut().last_mut() {
                        last.content.push_str(t.as_str());
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(blocks.into_inner())
}

/// Rewrite `<script>` elements according to `decide`
pub fn edit_scripts(html: &str, mut decide: impl FnMut(&ScriptBlock) -> ScriptEdit) -> Result<String> {
    let edits: Vec<ScriptEdit> = scripts(html)?.iter().map(&mut decide).collect();
    if edits.iter().all(|e| *e == ScriptEdit::Keep) {
        return Ok(html.to_string());
    }

    let seen = Cell::new(0usize);
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("script", |el| {
                let index = seen.get();
                seen.set(index + 1);
                match edits.get(index) {
                    Some(ScriptEdit::Remove) => el.remove(),
                    Some(ScriptEdit::SetSrc(src)) => el.set_attribute("src", src)?,
                    Some(ScriptEdit::Replace {
                        content,
                        strip_type,
                    }) => {
                        if *strip_type {
                            el.remove_attribute("type");
                        }
                        el.set_inner_content(&escape_script(content), ContentType::Html);
                    }
                    Some(ScriptEdit::Keep) | None => {}
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(out)
}

/// Keep inline script text from closing its element early
pub fn escape_script(code: &str) -> String {
    SCRIPT_CLOSE.replace_all(code, "<\\/script").into_owned()
}

/// All `<style>` elements with their raw text
pub fn styles(html: &str) -> Result<Vec<StyleBlock>> {
    let blocks = RefCell::new(Vec::new());
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("style", |_el| {
                    let mut blocks = blocks.borrow_mut();
                    let index = blocks.len();
                    blocks.push(StyleBlock {
                        index,
                        content: String::new(),
                    });
                    Ok(())
                }),
                text!("style", |t| {
                    if let Some(last) = blocks.borrow_mut().last_mut() {
                        last.content.push_str(t.as_str());
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(blocks.into_inner())
}

/// Replace `<style>` contents where `decide` returns new CSS
pub fn edit_styles(
    html: &str,
    mut decide: impl FnMut(&StyleBlock) -> Option<String>,
) -> Result<String> {
    let edits: Vec<Option<String>> = styles(html)?.iter().map(&mut decide).collect();
    if edits.iter().all(Option::is_none) {
        return Ok(html.to_string());
    }

    let seen = Cell::new(0usize);
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("style", |el| {
                let index = seen.get();
                seen.set(index + 1);
                if let Some(Some(css)) = edits.get(index) {
                    el.set_inner_content(css, ContentType::Html);
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(out)
}

/// Number of elements matching `selector`
pub fn count(html: &str, selector: &str) -> Result<usize> {
    let seen = Cell::new(0usize);
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(selector, |_el| {
                seen.set(seen.get() + 1);
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(seen.get())
}

/// Insert `content` at one element matching `selector`
///
/// Returns the rewritten document and whether an element matched.
pub fn insert_html(
    html: &str,
    selector: &str,
    occurrence: Occurrence,
    placement: Placement,
    content: &str,
) -> Result<(String, bool)> {
    let target = match occurrence {
        Occurrence::First => 0,
        Occurrence::Last => match count(html, selector)? {
            0 => return Ok((html.to_string(), false)),
            n => n - 1,
        },
    };

    let seen = Cell::new(0usize);
    let matched = Cell::new(false);
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(selector, |el| {
                let index = seen.get();
                seen.set(index + 1);
                if index == target {
                    match placement {
                        Placement::Prepend => el.prepend(content, ContentType::Html),
                        Placement::Append => el.append(content, ContentType::Html),
                        Placement::Before => el.before(content, ContentType::Html),
                        Placement::After => el.after(content, ContentType::Html),
                    }
                    matched.set(true);
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok((out, matched.get()))
}

/// Rewrite `attr` on every element matching `selector`
///
/// `map` returns the new value, or `None` to leave the attribute alone.
pub fn map_attribute(
    html: &str,
    selector: &str,
    attr: &str,
    mut map: impl FnMut(&str) -> Option<String>,
) -> Result<String> {
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(selector, |el| {
                if let Some(value) = el.get_attribute(attr) {
                    if let Some(new_value) = map(&value) {
                        el.set_attribute(attr, &new_value)?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(out)
}

/// Drop `attr` from every element matching `selector`
pub fn remove_attribute(html: &str, selector: &str, attr: &str) -> Result<String> {
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(selector, |el| {
                el.remove_attribute(attr);
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(out)
}

/// Text of the first `<title>`, trimmed
pub fn title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title> Chess </title><style>.a{color:red}</style></head><body><header>h</header><script src="https://cdn.example/marked.js"></script><script>var a = 1;</script><script type="module">let b = 2;</script><script type="application/ld+json">{}</script><style>.b{}</style></body></html>"#;

    #[test]
    fn test_scripts_in_document_order() {
        let blocks = scripts(PAGE).unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].src.as_deref(), Some("https://cdn.example/marked.js"));
        assert!(!blocks[0].is_inline());
        assert_eq!(blocks[1].content, "var a = 1;");
        assert!(blocks[2].is_module());
        assert!(blocks[2].is_javascript());
        assert!(!blocks[3].is_javascript());
    }

    #[test]
    fn test_edit_scripts_applies_by_index() {
        let out = edit_scripts(PAGE, |b| match b.index {
            0 => ScriptEdit::SetSrc("libs/marked.min.js".to_string()),
            1 => ScriptEdit::Remove,
            2 => ScriptEdit::Replace {
                content: "var b=2;".to_string(),
                strip_type: true,
            },
            _ => ScriptEdit::Keep,
        })
        .unwrap();

        assert!(out.contains(r#"<script src="libs/marked.min.js"></script>"#));
        assert!(!out.contains("var a = 1;"));
        assert!(out.contains("<script>var b=2;</script>"));
        assert!(out.contains(r#"type="application/ld+json""#));
    }

    #[test]
    fn test_edit_scripts_keep_all_is_identity() {
        let out = edit_scripts(PAGE, |_| ScriptEdit::Keep).unwrap();
        assert_eq!(out, PAGE);
    }

    #[test]
    fn test_replaced_script_cannot_close_early() {
        let html = "<body><script>x</script></body>";
        let out = edit_scripts(html, |_| ScriptEdit::Replace {
            content: "document.write('</script>')".to_string(),
            strip_type: false,
        })
        .unwrap();
        assert!(out.contains(r"'<\/script>'"));
    }

    #[test]
    fn test_edit_styles() {
        let out = edit_styles(PAGE, |s| (s.index == 1).then(|| ".b{color:blue}".to_string())).unwrap();
        assert!(out.contains("<style>.a{color:red}</style>"));
        assert!(out.contains("<style>.b{color:blue}</style>"));
    }

    #[test]
    fn test_insert_after_first_and_into_last() {
        let (out, matched) =
            insert_html(PAGE, "header", Occurrence::First, Placement::After, "<div id=\"badge\"></div>")
                .unwrap();
        assert!(matched);
        assert!(out.contains("<header>h</header><div id=\"badge\"></div>"));

        let (out, matched) =
            insert_html(PAGE, "style", Occurrence::Last, Placement::Append, ".c{}").unwrap();
        assert!(matched);
        assert!(out.contains("<style>.b{}.c{}</style>"));
        assert!(out.contains("<style>.a{color:red}</style>"));
    }

    #[test]
    fn test_insert_reports_missing_anchor() {
        let (out, matched) =
            insert_html(PAGE, "nav", Occurrence::First, Placement::After, "<p></p>").unwrap();
        assert!(!matched);
        assert_eq!(out, PAGE);
    }

    #[test]
    fn test_attribute_helpers() {
        let html = r#"<a href="x" target="_blank">x</a><video src="clip.mp4"></video>"#;
        let out = remove_attribute(html, "a[target]", "target").unwrap();
        assert!(!out.contains("_blank"));

        let out = map_attribute(&out, "video[src]", "src", |v| {
            v.strip_suffix(".mp4").map(|stem| format!("{stem}.webm"))
        })
        .unwrap();
        assert!(out.contains(r#"src="clip.webm""#));
    }

    #[test]
    fn test_title() {
        assert_eq!(title(PAGE).as_deref(), Some("Chess"));
        assert_eq!(title("<p>none</p>"), None);
    }
}
