//! Page Transform
//!
//! This module handles:
//! - The fixed [`PageStage`] order every downleveled page goes through
//! - Page classification ([`kind`]) and the patch registry ([`patches`])
//! - Injected shims and markup ([`shims`])
//! - Failure isolation: a failing or panicking page is written back untouched

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{BuildConfig, LibraryMatcher, TargetProfile};
use crate::error::Result;
use crate::html::{self, Occurrence, Placement, ScriptEdit};
use crate::postpatch::patch_after_minify;
use crate::report::FileStatus;
use crate::transform::css::{substitute_root_variables, transform_css};
use crate::transform::js::{detect_source, downgrade_js, obfuscate_js};
use crate::transform::minify::minify_html;
use crate::transform::{Engines, JsSource};
use crate::vendor::LibraryVendor;

pub mod kind;
pub mod patches;
pub mod shims;

pub use kind::PageKind;

#[allow(clippy::expect_used)]
static MP4_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.mp4\b").expect("valid regex"));

/// Stages of the Page Transform, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStage {
    StripRedirects,
    SubstituteLibraries,
    TranspileScripts,
    TranspileStyles,
    InjectPolyfills,
    FixMarkup,
    InjectBadge,
    ApplyLayoutPatches,
    Minify,
    PatchAfterMinify,
}

impl PageStage {
    pub const ORDER: [PageStage; 10] = [
        PageStage::StripRedirects,
        PageStage::SubstituteLibraries,
        PageStage::TranspileScripts,
        PageStage::TranspileStyles,
        PageStage::InjectPolyfills,
        PageStage::FixMarkup,
        PageStage::InjectBadge,
        PageStage::ApplyLayoutPatches,
        PageStage::Minify,
        PageStage::PatchAfterMinify,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PageStage::StripRedirects => "strip-redirects",
            PageStage::SubstituteLibraries => "substitute-libraries",
            PageStage::TranspileScripts => "transpile-scripts",
            PageStage::TranspileStyles => "transpile-styles",
            PageStage::InjectPolyfills => "inject-polyfills",
            PageStage::FixMarkup => "fix-markup",
            PageStage::InjectBadge => "inject-badge",
            PageStage::ApplyLayoutPatches => "apply-layout-patches",
            PageStage::Minify => "minify",
            PageStage::PatchAfterMinify => "patch-after-minify",
        }
    }

    /// Stages `profile` runs, in [`PageStage::ORDER`]
    pub fn for_profile(profile: &TargetProfile) -> Vec<PageStage> {
        Self::ORDER
            .into_iter()
            .filter(|stage| match stage {
                PageStage::PatchAfterMinify => profile.legacy_flex_prefix,
                _ => profile.is_downleveled(),
            })
            .collect()
    }
}

/// Result of transforming one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub html: String,
    pub status: FileStatus,
    pub warnings: Vec<String>,
}

/// Per-page mutable state threaded through the stages
struct PageRun {
    kind: PageKind,
    /// `../` repeated to reach the target root from the page
    root_prefix: String,
    fell_back: bool,
    warnings: Vec<String>,
}

/// Page Transform for one target
pub struct PageTransformer<'a> {
    profile: &'a TargetProfile,
    target_root: &'a Path,
    config: &'a BuildConfig,
    libraries: &'a LibraryMatcher,
    engines: &'a Engines,
    vendor: &'a mut LibraryVendor,
    stages: Vec<PageStage>,
}

impl<'a> PageTransformer<'a> {
    pub fn new(
        profile: &'a TargetProfile,
        target_root: &'a Path,
        config: &'a BuildConfig,
        libraries: &'a LibraryMatcher,
        engines: &'a Engines,
        vendor: &'a mut LibraryVendor,
    ) -> Self {
        Self {
            profile,
            target_root,
            config,
            libraries,
            engines,
            vendor,
            stages: PageStage::for_profile(profile),
        }
    }

    pub fn stages(&self) -> &[PageStage] {
        &self.stages
    }

    /// Transform one page; `page` is its path relative to the target root
    ///
    /// Never fails: any error or panic yields the original document with
    /// [`FileStatus::PassedThroughOnError`].
    pub fn transform(&mut self, page: &Path, original: &str) -> PageOutcome {
        let result = catch_unwind(AssertUnwindSafe(|| self.run(page, original)));

        let reason = match result {
            Ok(Ok(run)) => return run,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        tracing::warn!(
            page = %page.display(),
            target_id = %self.profile.id,
            error = %reason,
            "page transform failed, writing original"
        );
        PageOutcome {
            html: original.to_string(),
            status: FileStatus::PassedThroughOnError,
            warnings: vec![reason],
        }
    }

    fn run(&mut self, page: &Path, original: &str) -> Result<PageOutcome> {
        let depth = page.components().count().saturating_sub(1);
        let mut run = PageRun {
            kind: PageKind::classify(original),
            root_prefix: "../".repeat(depth),
            fell_back: false,
            warnings: Vec::new(),
        };
        tracing::debug!(page = %page.display(), kind = %run.kind, "page transform");

        let mut document = original.to_string();
        for stage in self.stages.clone() {
            document = self.apply(stage, document, &mut run)?;
        }

        Ok(PageOutcome {
            html: document,
            status: FileStatus::from_fallback(run.fell_back),
            warnings: run.warnings,
        })
    }

    fn apply(&mut self, stage: PageStage, document: String, run: &mut PageRun) -> Result<String> {
        match stage {
            PageStage::StripRedirects => self.strip_redirects(&document),
            PageStage::SubstituteLibraries => self.substitute_libraries(&document, run),
            PageStage::TranspileScripts => self.transpile_scripts(&document, run),
            PageStage::TranspileStyles => self.transpile_styles(&document, run),
            PageStage::InjectPolyfills => self.inject_polyfills(&document, run),
            PageStage::FixMarkup => fix_markup(&document),
            PageStage::InjectBadge => self.inject_badge(&document, run),
            PageStage::ApplyLayoutPatches => apply_layout_patches(&document, run),
            PageStage::Minify => {
                let minified = minify_html(self.engines.js.as_ref(), &document)?;
                if self.profile.obfuscate {
                    self.obfuscate_scripts(&minified, run)
                } else {
                    Ok(minified)
                }
            }
            PageStage::PatchAfterMinify => Ok(patch_after_minify(&document)),
        }
    }

    fn strip_redirects(&self, document: &str) -> Result<String> {
        let sentinels = &self.config.redirect_sentinels;
        html::edit_scripts(document, |block| {
            if block.is_inline() && sentinels.iter().any(|s| block.content.contains(s.as_str())) {
                ScriptEdit::Remove
            } else {
                ScriptEdit::Keep
            }
        })
    }

    fn substitute_libraries(&mut self, document: &str, run: &mut PageRun) -> Result<String> {
        let (profile, root, engines, libraries) =
            (self.profile, self.target_root, self.engines, self.libraries);
        let vendor = &mut *self.vendor;

        html::edit_scripts(document, |block| {
            let Some(library) = block.src.as_deref().and_then(|src| libraries.resolve(src)) else {
                return ScriptEdit::Keep;
            };
            let outcome = vendor.vendor(&library.url, root, &library.file, profile, engines);
            if let Some(warning) = outcome.warning() {
                run.warnings.push(warning);
            }
            if outcome.is_local() {
                ScriptEdit::SetSrc(format!("{}{}", run.root_prefix, outcome.src))
            } else {
                ScriptEdit::Keep
            }
        })
    }

    fn transpile_scripts(&self, document: &str, run: &mut PageRun) -> Result<String> {
        let script_patches: Vec<_> = patches::script_patches_for(run.kind).collect();
        let mut anchored = vec![false; script_patches.len()];
        let mut fell_back = false;

        let out = html::edit_scripts(document, |block| {
            if !block.is_inline() || !block.is_javascript() || block.content.trim().is_empty() {
                return ScriptEdit::Keep;
            }

            let mut code = block.content.clone();
            for (patch, hit) in script_patches.iter().zip(anchored.iter_mut()) {
                if let Some(patched) = patch.apply(&code) {
                    code = patched;
                    *hit = true;
                }
            }

            let source = if block.is_module() {
                JsSource::Module
            } else {
                JsSource::Script
            };
            let out = downgrade_js(self.engines.js.as_ref(), &code, self.profile, source);
            fell_back |= out.fell_back();
            ScriptEdit::Replace {
                content: out.code,
                strip_type: block.is_module(),
            }
        })?;

        run.fell_back |= fell_back;
        for (patch, hit) in script_patches.iter().zip(anchored) {
            if !hit {
                tracing::warn!(patch = patch.name, "script patch anchor not found");
                run.warnings.push(format!(
                    "script patch '{}': anchor '{}' not found",
                    patch.name, patch.anchor
                ));
            }
        }
        Ok(out)
    }

    /// Keyword obfuscation for every inline script, injected ones included
    ///
    /// Runs after minification: reprinting a script turns escaped names back
    /// into plain text.
    fn obfuscate_scripts(&self, document: &str, run: &mut PageRun) -> Result<String> {
        let engine = self.engines.js.as_ref();
        let mut reasons = Vec::new();

        let out = html::edit_scripts(document, |block| {
            if !block.is_inline() || !block.is_javascript() || block.content.trim().is_empty() {
                return ScriptEdit::Keep;
            }
            let source = if block.is_module() {
                JsSource::Module
            } else {
                detect_source(engine, &block.content)
            };
            let out = obfuscate_js(engine, &self.engines.obfuscation, &block.content, source);
            if let Some(reason) = out.fallback {
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
            }
            ScriptEdit::Replace {
                content: out.code,
                strip_type: false,
            }
        })?;

        run.fell_back |= !reasons.is_empty();
        run.warnings
            .extend(reasons.into_iter().map(|r| format!("inline script: {r}")));
        Ok(out)
    }

    fn transpile_styles(&self, document: &str, run: &mut PageRun) -> Result<String> {
        let mut fell_back = false;
        let out = html::edit_styles(document, |block| {
            let out = transform_css(self.engines.css.as_ref(), &block.content, self.profile);
            fell_back |= out.fell_back();
            Some(substitute_root_variables(&out.code))
        })?;
        run.fell_back |= fell_back;
        Ok(out)
    }

    fn inject_polyfills(&mut self, document: &str, run: &mut PageRun) -> Result<String> {
        let (profile, root, engines) = (self.profile, self.target_root, self.engines);
        let mut tags = String::new();
        for polyfill in &profile.polyfills {
            let outcome = self
                .vendor
                .vendor(&polyfill.url, root, &polyfill.file, profile, engines);
            if let Some(warning) = outcome.warning() {
                run.warnings.push(warning);
            }
            let src = if outcome.is_local() {
                format!("{}{}", run.root_prefix, outcome.src)
            } else {
                outcome.src
            };
            tags.push_str(&format!("<script src=\"{src}\"></script>"));
        }
        tags.push_str(&format!("<script>{}</script>", shims::RUNTIME_SHIM));

        let (out, matched) =
            html::insert_html(document, "head", Occurrence::First, Placement::Prepend, &tags)?;
        if !matched {
            run.warnings
                .push("no <head>: polyfills not injected".to_string());
        }
        Ok(out)
    }

    fn inject_badge(&self, document: &str, run: &mut PageRun) -> Result<String> {
        let anchor = self.config.badge_anchor.as_str();
        let (out, matched) = html::insert_html(
            document,
            anchor,
            Occurrence::First,
            Placement::After,
            &shims::badge(self.profile),
        )?;
        if !matched {
            run.warnings
                .push(format!("badge anchor '{anchor}' not found"));
        }

        let (out, matched) = html::insert_html(
            &out,
            "body",
            Occurrence::First,
            Placement::Append,
            &shims::modals(self.profile),
        )?;
        if !matched {
            run.warnings
                .push("no <body>: modals not injected".to_string());
        }
        Ok(out)
    }
}

fn fix_markup(document: &str) -> Result<String> {
    let out = html::remove_attribute(document, "a[target=\"_blank\"]", "target")?;
    let to_webm = |value: &str| {
        MP4_REFERENCE
            .is_match(value)
            .then(|| MP4_REFERENCE.replace_all(value, ".webm").into_owned())
    };
    let out = html::map_attribute(&out, "source[src]", "src", to_webm)?;
    html::map_attribute(&out, "video[src]", "src", to_webm)
}

fn apply_layout_patches(document: &str, run: &mut PageRun) -> Result<String> {
    let mut out = document.to_string();
    for patch in patches::layout_patches_for(run.kind) {
        let (patched, matched) =
            html::insert_html(&out, "style", Occurrence::Last, Placement::Append, patch.css)?;
        out = if matched {
            patched
        } else {
            let style = format!("<style>{}</style>", patch.css);
            let (patched, matched) =
                html::insert_html(&out, "head", Occurrence::First, Placement::Append, &style)?;
            if !matched {
                run.warnings
                    .push(format!("layout patch '{}': no <style> or <head>", patch.name));
            }
            patched
        };

        if let Some(js) = patch.js {
            let script = format!("<script>{}</script>", html::escape_script(js));
            let (patched, matched) =
                html::insert_html(&out, "body", Occurrence::First, Placement::Append, &script)?;
            if !matched {
                run.warnings
                    .push(format!("layout patch '{}': no <body> for script", patch.name));
            }
            out = patched;
        }
        tracing::debug!(patch = patch.name, "applied layout patch");
    }
    Ok(out)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "page transform panicked".to_string(),
            |msg| format!("page transform panicked: {msg}"),
        )
}

#[cfg(test)]
mod tests;
