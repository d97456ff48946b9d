use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use tempfile::TempDir;

use super::*;
use crate::config::{MinBrowser, Polyfill, TargetId};
use crate::error::BuildError;
use crate::transform::{CssEngine, JsEngine, ObfuscationTable, OxcEngine};
use crate::vendor::Fetcher;

struct IdentityCss;

impl CssEngine for IdentityCss {
    fn downgrade(&self, css: &str, _query: &str) -> Result<String> {
        Ok(css.to_string())
    }
}

struct PassThroughJs;

impl JsEngine for PassThroughJs {
    fn downgrade(&self, code: &str, _: &str, _: bool, _: JsSource) -> Result<String> {
        Ok(code.trim().to_string())
    }

    fn strip(&self, code: &str, _: JsSource) -> Result<String> {
        Ok(code.trim().to_string())
    }

    fn obfuscate(&self, code: &str, table: &ObfuscationTable, _: JsSource) -> Result<String> {
        Ok(table.apply(code))
    }
}

struct PanickingJs;

impl JsEngine for PanickingJs {
    fn downgrade(&self, _: &str, _: &str, _: bool, _: JsSource) -> Result<String> {
        panic!("transpiler exploded");
    }

    fn strip(&self, code: &str, _: JsSource) -> Result<String> {
        Ok(code.to_string())
    }

    fn obfuscate(&self, code: &str, _: &ObfuscationTable, _: JsSource) -> Result<String> {
        Ok(code.to_string())
    }
}

struct StubFetcher {
    calls: Rc<Cell<usize>>,
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        if url.contains("unreachable") {
            return Err(BuildError::FetchFailed {
                url: url.to_string(),
                reason: "offline".to_string(),
            });
        }
        Ok(format!("/* {url} */ var lib = 1;").into_bytes())
    }
}

fn engines(js: Box<dyn JsEngine>) -> Engines {
    Engines {
        css: Box::new(IdentityCss),
        js,
        obfuscation: ObfuscationTable::default(),
    }
}

fn lite() -> TargetProfile {
    TargetProfile::new(TargetId::Lite, "lite", "https://lite.example")
        .with_min_browser(MinBrowser::new("safari 10", "es2015"))
        .with_polyfill(Polyfill::new("https://cdn.example/core.js", "core-js.min.js"))
}

fn legacy() -> TargetProfile {
    TargetProfile::new(TargetId::Legacy, "legacy", "https://legacy.example")
        .with_min_browser(MinBrowser::new("safari 6", "es2015"))
        .with_obfuscation()
        .with_legacy_flex_prefix()
        .with_all_transforms()
}

struct Harness {
    root: TempDir,
    config: BuildConfig,
    libraries: LibraryMatcher,
    engines: Engines,
    vendor: LibraryVendor,
    fetches: Rc<Cell<usize>>,
}

impl Harness {
    fn new(js: Box<dyn JsEngine>) -> Self {
        let config = BuildConfig::default();
        let libraries = LibraryMatcher::new(&config.libraries).unwrap();
        let fetches = Rc::new(Cell::new(0));
        Self {
            root: TempDir::new().unwrap(),
            config,
            libraries,
            engines: engines(js),
            vendor: LibraryVendor::new(Box::new(StubFetcher {
                calls: fetches.clone(),
            })),
            fetches,
        }
    }

    fn transform(&mut self, profile: &TargetProfile, page: &str, html: &str) -> PageOutcome {
        let mut transformer = PageTransformer::new(
            profile,
            self.root.path(),
            &self.config,
            &self.libraries,
            &self.engines,
            &mut self.vendor,
        );
        transformer.transform(Path::new(page), html)
    }
}

const HOME: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Retro OS</title>
<!-- build note -->
<script>if (!checkBrowserSupport()) { location.href = 'https://lite.retro-os.app'; }</script>
<script src="https://cdn.jsdelivr.net/npm/marked@12.0.0/lib/marked.umd.js"></script>
<style>
:root { --x: 10px; }
.grid { display: grid; }
.a { width: var(--x); }
</style>
</head>
<body>
<header>Retro OS</header>
<main id="app-grid"><a href="notes.html" target="_blank">Notes</a></main>
<video src="media/intro.mp4"></video>
<script type="module">function openApp(name) { location.href = name + '.html'; }</script>
</body>
</html>
"#;

#[test]
fn test_stage_order_per_profile() {
    let lite_stages = PageStage::for_profile(&lite());
    assert_eq!(lite_stages.len(), 9);
    assert_eq!(lite_stages.first(), Some(&PageStage::StripRedirects));
    assert_eq!(lite_stages.last(), Some(&PageStage::Minify));

    assert_eq!(PageStage::for_profile(&legacy()), PageStage::ORDER.to_vec());

    let main = TargetProfile::new(TargetId::Main, "main", "https://example");
    assert!(PageStage::for_profile(&main).is_empty());
}

#[test]
fn test_lite_page_transform() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let out = h.transform(&lite(), "index.html", HOME);
    let page = out.html;

    assert_eq!(out.status, FileStatus::Ok, "warnings: {:?}", out.warnings);

    // redirect script removed
    assert!(!page.contains("checkBrowserSupport"));

    // library vendored and substituted
    assert!(page.contains("libs/marked.min.js"));
    assert!(!page.contains("marked@12.0.0"));
    assert!(h.root.path().join("libs/marked.min.js").is_file());

    // module type stripped, gate patch applied before transpiling
    assert!(!page.contains("module"));
    assert!(page.contains("openAppUngated"));

    // styles downgraded
    assert!(page.contains("width:10px"));
    assert!(!page.contains("var(--"));
    assert!(page.contains("display:flex;flex-wrap:wrap"));
    assert!(!page.contains("display:grid"));

    // polyfills and shim at the top of <head>
    assert!(page.contains("libs/core-js.min.js"));
    assert!(page.contains("window.open=function(u)"));
    let head = page.find("<head>").unwrap();
    let polyfill = page.find("core-js.min.js").unwrap();
    let title = page.find("<title>").unwrap();
    assert!(head < polyfill && polyfill < title);

    // markup fixes
    assert!(!page.contains("_blank"));
    assert!(page.contains("media/intro.webm"));

    // badge after the header, modals in the body
    let header_end = page.find("</header>").unwrap();
    let badge = page.find("retro-badge").unwrap();
    assert!(header_end < badge);
    assert!(page.contains("retro-gate-modal"));
    assert!(page.contains("function retroGate(n)"));

    // home layout patch, and comments gone
    assert!(page.contains("#app-grid{display:flex;flex-wrap:wrap}"));
    assert!(!page.contains("build note"));
}

#[test]
fn test_variable_substitution_scenario() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let html = "<html><head><style>:root{--x:10px;} .a{width:var(--x);}</style></head><body></body></html>";
    let out = h.transform(&lite(), "vars.html", html);
    assert!(out.html.contains("width:10px"));
    assert!(!out.html.contains("var("));
}

#[test]
fn test_library_memoized_across_pages() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let page = |title: &str| {
        format!(
            "<html><head><title>{title}</title><script src=\"https://cdn.jsdelivr.net/npm/marked/marked.min.js\"></script></head><body></body></html>"
        )
    };

    let profile = TargetProfile::new(TargetId::Lite, "lite", "https://lite.example")
        .with_min_browser(MinBrowser::new("safari 10", "es2015"));
    let first = h.transform(&profile, "notes.html", &page("Notes"));
    let second = h.transform(&profile, "apps/reader/index.html", &page("Reader"));

    assert_eq!(h.fetches.get(), 1);
    assert!(first.html.contains("libs/marked.min.js"));
    assert!(second.html.contains("../../libs/marked.min.js"));

    let libs: Vec<_> = fs::read_dir(h.root.path().join("libs"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(libs, vec!["marked.min.js"]);
}

#[test]
fn test_panicking_transpiler_passes_page_through() {
    let mut h = Harness::new(Box::new(PanickingJs));
    let html = "<html><head><title>Notes</title></head><body><script>var a = 1;</script></body></html>";
    let out = h.transform(&lite(), "notes.html", html);

    assert_eq!(out.status, FileStatus::PassedThroughOnError);
    assert_eq!(out.html, html);
    assert!(out.warnings[0].contains("transpiler exploded"));
}

#[test]
fn test_missing_badge_anchor_is_a_warning() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let html = "<html><head><title>Notes</title></head><body><p>x</p></body></html>";
    let out = h.transform(&lite(), "notes.html", html);

    assert_eq!(out.status, FileStatus::Ok);
    assert!(out.warnings.iter().any(|w| w.contains("badge anchor 'header'")));
    assert!(out.html.contains("retro-info-modal"));
}

#[test]
fn test_missing_script_patch_anchor_is_a_warning() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let html = "<html><head></head><body><div id=\"app-grid\"></div><script>function launch(n) {}</script></body></html>";
    let out = h.transform(&lite(), "index.html", html);
    assert!(
        out.warnings
            .iter()
            .any(|w| w.contains("gate-feature-apps"))
    );
}

#[test]
fn test_failed_polyfill_keeps_remote_url() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let profile = lite().with_polyfill(Polyfill::new(
        "https://unreachable.example/fetch.js",
        "fetch.umd.min.js",
    ));
    let html = "<html><head></head><body><header></header></body></html>";
    let out = h.transform(&profile, "index.html", html);

    assert!(out.html.contains("https://unreachable.example/fetch.js"));
    assert!(out.warnings.iter().any(|w| w.contains("vendoring failed")));
}

#[test]
fn test_legacy_layout_patch_gets_flex_prefix() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let html = "<html><head><title>Chess</title></head><body><header></header><div id=\"chess-board\"></div></body></html>";
    let out = h.transform(&legacy(), "apps/chess/index.html", html);

    // no <style> existed, so one was created for the patch
    assert!(
        out.html
            .contains("#chess-board{display:-webkit-box;display:flex;flex-wrap:wrap")
    );
    assert!(!out.html.contains(";display:flex;display:flex"));
}

#[test]
fn test_legacy_inline_scripts_are_obfuscated() {
    let mut h = Harness::new(Box::new(PassThroughJs));
    let html = "<html><head></head><body><script>var p = new Promise(function(r){r()});</script></body></html>";
    let out = h.transform(&legacy(), "index.html", html);
    assert!(out.html.contains("\\u0050romise"));
}

fn inline_scripts(html: &str) -> Vec<String> {
    let re = Regex::new(r"(?s)<script[^>]*>(.*?)</script>").unwrap();
    re.captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|code| !code.trim().is_empty())
        .collect()
}

#[test]
fn test_legacy_page_scripts_stay_obfuscated_after_minify() {
    let mut h = Harness::new(Box::new(OxcEngine));
    let html = r#"<html><head><title>Notes</title></head><body><header>Notes</header>
<script>
async function load() { return await fetch('/notes.json'); }
var ready = new Promise(function (resolve) { resolve('class'); });
</script>
</body></html>"#;
    let out = h.transform(&legacy(), "notes.html", html);
    assert_eq!(out.status, FileStatus::Ok, "{:?}", out.warnings);

    let table = ObfuscationTable::default();
    let scripts = inline_scripts(&out.html);
    assert!(scripts.len() >= 2, "user script and runtime shim expected");
    for code in scripts {
        assert!(table.remaining(&code).is_empty(), "{code}");
        assert!(OxcEngine.strip(&code, JsSource::Script).is_ok(), "{code}");
    }
}

#[test]
fn test_unlowered_inline_script_is_reported() {
    let mut h = Harness::new(Box::new(OxcEngine));
    let html = "<html><head></head><body><header></header><script>var s = `hi`;</script></body></html>";
    let out = h.transform(&legacy(), "notes.html", html);

    assert_eq!(out.status, FileStatus::TransformedWithFallback);
    assert!(out.warnings.iter().any(|w| w.contains("inline script")));
    for code in inline_scripts(&out.html) {
        assert!(OxcEngine.strip(&code, JsSource::Script).is_ok(), "{code}");
    }
}
