//! Targets command
//!
//! Prints the resolved profile table, after any `retrobuild.yaml` overrides.

use std::fmt::Write as _;

use console::Style;

use crate::cli::TargetsArgs;
use crate::config::{BuildConfig, TargetId};
use crate::error::Result;

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Render the profile table
pub fn render(config: &BuildConfig) -> String {
    let label = Style::new().dim();
    let mut out = String::new();

    for profile in TargetId::ALL.iter().filter_map(|id| config.target(*id)) {
        let _ = writeln!(out, "{}", Style::new().bold().cyan().apply_to(profile.id));
        let _ = writeln!(out, "  {}      {}", label.apply_to("dir:"), profile.dir);
        let _ = writeln!(out, "  {}   {}", label.apply_to("domain:"), profile.domain);
        let browsers = profile.min_browser.as_ref().map_or_else(
            || "any (minify only)".to_string(),
            |min| format!("{} ({})", min.browsers, min.es_target),
        );
        let _ = writeln!(out, "  {} {}", label.apply_to("browsers:"), browsers);
        let _ = writeln!(
            out,
            "  {} obfuscate={} flex-prefix={} all-transforms={}",
            label.apply_to("options:"),
            yes_no(profile.obfuscate),
            yes_no(profile.legacy_flex_prefix),
            yes_no(profile.force_all_transforms),
        );
        if !profile.polyfills.is_empty() {
            let files: Vec<&str> = profile.polyfills.iter().map(|p| p.file.as_str()).collect();
            let _ = writeln!(out, "  {} {}", label.apply_to("polyfills:"), files.join(", "));
        }
    }

    let names: Vec<&str> = config.libraries.iter().map(|l| l.name.as_str()).collect();
    let _ = writeln!(out, "\n{} {}", label.apply_to("libraries:"), names.join(", "));
    let _ = writeln!(
        out,
        "{} {}",
        label.apply_to("output:"),
        config.out_dir.display()
    );
    out
}

/// Run the targets command
pub fn run(args: &TargetsArgs) -> Result<()> {
    let config = BuildConfig::load(&args.root, args.config.as_deref())?;
    print!("{}", render(&config));
    Ok(())
}
