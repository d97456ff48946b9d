//! Common test utilities for retrobuild integration tests

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A small site plus a directory standing in for the CDN
pub struct TestSite {
    /// Temporary directory holding the source tree
    #[allow(dead_code)]
    pub temp: TempDir,
    /// Temporary directory holding "remote" libraries
    #[allow(dead_code)]
    pub remote: TempDir,
    /// Path to the source root
    pub path: PathBuf,
}

impl TestSite {
    /// Create an empty site
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let remote = TempDir::new().expect("Failed to create remote directory");
        let path = temp.path().to_path_buf();
        Self { temp, remote, path }
    }

    /// Create the fixture site with a config pointing every download at `file://` URLs
    pub fn fixture() -> Self {
        let site = Self::new();

        site.write_remote("marked.js", "var marked = function (src) { return src; };\n");
        site.write_remote("core.js", "var corePolyfill = true;\n");
        site.write_remote("fetch.js", "var fetchPolyfill = true;\n");

        site.write_file(
            "index.html",
            r#"<!DOCTYPE html>
<html>
<head>
<title>Retro OS</title>
<!-- home page -->
<script>if (!checkBrowserSupport()) { location.href = 'https://lite.retro-os.app'; }</script>
<script src="https://cdn.example/marked@4.3.0/marked.min.js"></script>
<link rel="stylesheet" href="style.css">
<style>
:root { --accent: #ff0; }
.grid { display: grid; color: var(--accent); }
</style>
</head>
<body>
<header>Retro OS</header>
<main id="app-grid"><a href="apps/notes/index.html" target="_blank">Notes</a></main>
<script src="app.js"></script>
<script>function openApp(name) { location.href = 'apps/' + name + '/index.html'; }</script>
</body>
</html>
"#,
        );
        site.write_file(
            "apps/notes/index.html",
            r#"<!DOCTYPE html>
<html>
<head>
<title>Notes</title>
<script src="https://cdn.example/marked@4.3.0/marked.min.js"></script>
</head>
<body>
<header>Notes</header>
<div class="notes" style="display:flex"></div>
<video src="intro.mp4"></video>
</body>
</html>
"#,
        );
        site.write_file(
            "app.js",
            concat!(
                "// app bootstrap\n",
                "async function loadNotes() { const res = await fetch('/notes.json'); return res.json(); }\n",
                "var greet = (name) => 'hello ' + name;\n",
                "let total = [1, 2, 3].map((n) => n * 2);\n",
                "var ready = new Promise(function (resolve) { resolve(greet('class')); });\n",
            ),
        );
        site.write_file(
            "widgets.js",
            "export class Widget { render() { return `<div></div>`; } }\n",
        );
        site.write_file(
            "style.css",
            "/* layout */\n.row {\n  display: flex;\n  height: 100dvh;\n}\n",
        );
        site.write_file("node_modules/dep/index.js", "module.exports = 1;\n");
        site.write_file("README.md", "# Retro OS\n");

        let config = format!(
            r#"out_dir: dist
fetch_timeout_secs: 5
libraries:
  - name: marked
    pattern: 'marked(@[\w.\-]+)?/.*\.js$'
    url: '{marked}'
    file: marked.min.js
targets:
  - id: main
    dir: main
    domain: https://retro.example
  - id: lite
    dir: lite
    domain: https://lite.retro.example
    min_browser:
      browsers: safari 10
      es_target: es2015
    polyfills:
      - url: '{core}'
        file: core-js.min.js
  - id: legacy
    dir: legacy
    domain: https://legacy.retro.example
    min_browser:
      browsers: safari 6
      es_target: es2015
    obfuscate: true
    legacy_flex_prefix: true
    force_all_transforms: true
    polyfills:
      - url: '{core}'
        file: core-js.min.js
      - url: '{fetch}'
        file: fetch.umd.min.js
"#,
            marked = site.remote_url("marked.js"),
            core = site.remote_url("core.js"),
            fetch = site.remote_url("fetch.js"),
        );
        site.write_file("retrobuild.yaml", &config);
        site
    }

    /// Write a file in the source tree
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Write a "remote" library
    pub fn write_remote(&self, name: &str, content: &str) {
        std::fs::write(self.remote.path().join(name), content).expect("Failed to write remote");
    }

    /// `file://` URL of a remote library
    pub fn remote_url(&self, name: &str) -> String {
        format!("file://{}", self.remote.path().join(name).display())
    }

    /// Read a file relative to the source root
    #[allow(dead_code)]
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Check if a path exists relative to the source root
    #[allow(dead_code)]
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Output root of one target
    #[allow(dead_code)]
    pub fn target_root(&self, dir: &str) -> PathBuf {
        self.path.join("dist").join(dir)
    }
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted file names in a directory
#[allow(dead_code)]
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|e| {
            e.expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    names.sort();
    names
}

/// Whether `code` parses as a classic script or, failing that, as a module
#[allow(dead_code)]
pub fn parses(code: &str) -> bool {
    use oxc::allocator::Allocator;
    use oxc::parser::Parser;
    use oxc::span::SourceType;

    [SourceType::cjs(), SourceType::mjs()].into_iter().any(|source_type| {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, code, source_type).parse();
        !parsed.panicked && parsed.errors.is_empty()
    })
}

/// Bodies of the non-empty inline `<script>` blocks in `html`
#[allow(dead_code)]
pub fn inline_scripts(html: &str) -> Vec<String> {
    let re = regex::Regex::new(r"(?s)<script[^>]*>(.*?)</script>").unwrap();
    re.captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|code| !code.trim().is_empty())
        .collect()
}
