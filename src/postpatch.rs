//! Post-minification patch
//!
//! Declarations added after the Style Transform ran (layout patches, inline
//! `style` attributes) never got the legacy flex prefix. This pass adds it to
//! minified output, per page and again as a sweep over a finished target root.

use std::fs;
use std::path::Path;

use crate::discovery;
use crate::error::{BuildError, Result};
use crate::transform::css::flex_fallback;

/// Precede every `display:flex` with `display:-webkit-box`; idempotent
pub fn patch_after_minify(html: &str) -> String {
    flex_fallback(html)
}

/// Apply [`patch_after_minify`] to every HTML and CSS file under `root`, outside `libs/`
///
/// Returns the number of files rewritten.
pub fn sweep(root: &Path) -> Result<usize> {
    let mut changed = 0;
    for path in discovery::files_with_extension(root, &["html", "htm", "css"]) {
        let content = fs::read_to_string(&path).map_err(|e| BuildError::read(&path, &e))?;
        let patched = patch_after_minify(&content);
        if patched != content {
            fs::write(&path, patched).map_err(|e| BuildError::write(&path, &e))?;
            changed += 1;
        }
    }
    tracing::debug!(root = %root.display(), changed, "post-minification sweep");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_patch_inline_style_attribute() {
        let html = r#"<div style="display:flex;color:red"></div>"#;
        assert_eq!(
            patch_after_minify(html),
            r#"<div style="display:-webkit-box;display:flex;color:red"></div>"#
        );
    }

    #[test]
    fn test_patch_is_idempotent() {
        let html = "<style>.a{display:flex!important}.b{display:flex}</style>";
        let once = patch_after_minify(html);
        assert_eq!(patch_after_minify(&once), once);
        assert!(once.contains("display:-webkit-box!important;display:flex!important"));
    }

    #[test]
    fn test_sweep_skips_libs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("libs")).unwrap();
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("index.html"), "<style>.a{display:flex}</style>").unwrap();
        fs::write(root.join("apps/app.css"), ".b{color:red}").unwrap();
        fs::write(root.join("libs/lib.css"), ".c{display:flex}").unwrap();

        assert_eq!(sweep(root).unwrap(), 1);
        assert!(
            fs::read_to_string(root.join("index.html"))
                .unwrap()
                .contains("display:-webkit-box;display:flex")
        );
        assert_eq!(
            fs::read_to_string(root.join("libs/lib.css")).unwrap(),
            ".c{display:flex}"
        );
        assert_eq!(sweep(root).unwrap(), 0);
    }
}
