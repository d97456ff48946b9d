//! Build command
//!
//! Resolves configuration for the source root, applies command-line
//! overrides, and runs the [`Builder`] with live or silent progress.

use std::path::{self, Path};
use std::time::Duration;

use console::Style;

use crate::build::{BuildOptions, Builder};
use crate::cli::BuildArgs;
use crate::config::BuildConfig;
use crate::error::Result;
use crate::report::{BuildReport, FileStatus, REPORT_FILE_NAME};
use crate::ui::{InteractiveProgressReporter, ProgressReporter, SilentProgressReporter};
use crate::vendor::HttpFetcher;

/// Resolve configuration and apply the `--out` override
///
/// An output directory inside the source root is stored relative to it, so
/// it stays out of replication.
pub fn resolve_config(args: &BuildArgs) -> Result<BuildConfig> {
    let mut config = BuildConfig::load(&args.root, args.config.as_deref())?;

    if let Some(out) = &args.out {
        let out = path::absolute(out)?;
        let root = path::absolute(&args.root)?;
        config.out_dir = out
            .strip_prefix(&root)
            .map_or_else(|_| out.clone(), Path::to_path_buf);
        config.validate()?;
    }

    Ok(config)
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
    let reporter: Box<dyn ProgressReporter> = if args.quiet {
        Box::new(SilentProgressReporter)
    } else {
        Box::new(InteractiveProgressReporter::new())
    };
    let options = BuildOptions {
        only: args.only,
        sitemap: !args.no_sitemap,
    };

    let mut builder = Builder::new(&args.root, config, options, Box::new(fetcher), reporter);
    let report = builder.run()?;

    if !args.quiet {
        print_summary(&report, &builder.out_dir().join(REPORT_FILE_NAME));
    }
    Ok(())
}

fn print_summary(report: &BuildReport, report_path: &Path) {
    for target in &report.targets {
        println!(
            "  {:<8} {} ok, {} with fallback, {} passed through",
            Style::new().bold().apply_to(target),
            report.count(*target, FileStatus::Ok),
            report.count(*target, FileStatus::TransformedWithFallback),
            report.count(*target, FileStatus::PassedThroughOnError),
        );
    }
    for warning in &report.warnings {
        println!("  {} {warning}", Style::new().yellow().apply_to("warning:"));
    }
    println!("  Report: {}", report_path.display());
}
