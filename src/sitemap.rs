//! Sitemap generation
//!
//! Lists every HTML page of a target root as a `<url>` against the target's
//! public domain. `index.html` maps to its directory.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery;
use crate::error::{BuildError, Result};

pub const SITEMAP_FILE_NAME: &str = "sitemap.xml";

/// Public URL of a page relative to the target root
pub fn page_url(domain: &str, relative: &Path) -> String {
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    if parts.last().is_some_and(|last| last == "index.html") {
        parts.pop();
        let mut path = parts.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        format!("{}/{}", domain.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", domain.trim_end_matches('/'), parts.join("/"))
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Serialize a urlset for `pages`
pub fn render(domain: &str, pages: &[PathBuf]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for page in pages {
        let _ = writeln!(
            xml,
            "  <url><loc>{}</loc></url>",
            escape_xml(&page_url(domain, page))
        );
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Write `<root>/sitemap.xml`, returning the number of pages listed
pub fn generate(root: &Path, domain: &str) -> Result<usize> {
    let pages: Vec<PathBuf> = discovery::files_with_extension(root, &["html"])
        .into_iter()
        .filter_map(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();

    let path = root.join(SITEMAP_FILE_NAME);
    fs::write(&path, render(domain, &pages)).map_err(|e| BuildError::write(&path, &e))?;
    Ok(pages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_url() {
        let domain = "https://lite.example/";
        assert_eq!(page_url(domain, Path::new("index.html")), "https://lite.example/");
        assert_eq!(
            page_url(domain, Path::new("apps/chess/index.html")),
            "https://lite.example/apps/chess/"
        );
        assert_eq!(
            page_url(domain, Path::new("about.html")),
            "https://lite.example/about.html"
        );
    }

    #[test]
    fn test_render_escapes() {
        let xml = render("https://a.example", &[PathBuf::from("q&a.html")]);
        assert!(xml.contains("<loc>https://a.example/q&amp;a.html</loc>"));
        assert!(xml.starts_with("<?xml"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_generate_lists_sorted_pages() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("apps/wordle")).unwrap();
        fs::create_dir_all(root.join("libs")).unwrap();
        fs::write(root.join("index.html"), "").unwrap();
        fs::write(root.join("apps/wordle/index.html"), "").unwrap();
        fs::write(root.join("libs/demo.html"), "").unwrap();
        fs::write(root.join("style.css"), "").unwrap();

        assert_eq!(generate(root, "https://legacy.example").unwrap(), 2);
        let xml = fs::read_to_string(root.join(SITEMAP_FILE_NAME)).unwrap();
        let wordle = xml.find("/apps/wordle/").unwrap();
        let home = xml.find("<loc>https://legacy.example/</loc>").unwrap();
        assert!(wordle < home);
        assert!(!xml.contains("demo.html"));
    }
}
