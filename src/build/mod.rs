//! Build orchestrator
//!
//! The build process:
//! 1. Clean and replicate the source into every selected target root
//! 2. `main`: minify every HTML/CSS/JS file
//! 3. Downleveled targets: Page Transform over HTML, then Script Transform
//!    over JS outside `libs/`, then Style Transform over CSS
//! 4. Post-minification sweep for targets with the legacy flex prefix
//! 5. One sitemap per target, then the build report
//!
//! Steps 4 and 5 are tail stages: their failures are logged and recorded in
//! the report but never fail the build.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{BuildConfig, LibraryMatcher, TargetId, TargetProfile};
use crate::discovery;
use crate::error::{BuildError, Result};
use crate::page::PageTransformer;
use crate::postpatch;
use crate::report::{BuildReport, FileStatus};
use crate::sitemap;
use crate::transform::css::transform_css;
use crate::transform::js::{detect_source, strip_js, transform_js};
use crate::transform::minify::{minify_css, minify_html};
use crate::transform::{Engines, Transformed};
use crate::ui::ProgressReporter;
use crate::vendor::{Fetcher, LibraryVendor};


/// Per-run switches coming from the command line
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Targets to build; empty means all
    pub only: Vec<TargetId>,

    /// Write `sitemap.xml` into every target root
    pub sitemap: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            only: Vec::new(),
            sitemap: true,
        }
    }
}

impl BuildOptions {
    /// Selected target ids in build order
    pub fn selected(&self) -> Vec<TargetId> {
        TargetId::ALL
            .into_iter()
            .filter(|id| self.only.is_empty() || self.only.contains(id))
            .collect()
    }
}

/// One build run over a source tree
pub struct Builder {
    source_root: PathBuf,
    out_dir: PathBuf,
    config: BuildConfig,
    options: BuildOptions,
    engines: Engines,
    vendor: LibraryVendor,
    reporter: Box<dyn ProgressReporter>,
}

impl Builder {
    pub fn new(
        source_root: &Path,
        config: BuildConfig,
        options: BuildOptions,
        fetcher: Box<dyn Fetcher>,
        reporter: Box<dyn ProgressReporter>,
    ) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            out_dir: config.out_dir(source_root),
            config,
            options,
            engines: Engines::default(),
            vendor: LibraryVendor::new(fetcher),
            reporter,
        }
    }

    /// Replace the default CSS/JS engines
    pub fn with_engines(mut self, engines: Engines) -> Self {
        self.engines = engines;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run the whole pipeline
    ///
    /// Only fatal-to-run failures are returned; everything else is in the report.
    pub fn run(&mut self) -> Result<BuildReport> {
        let result = self.run_inner();
        if result.is_err() {
            self.reporter.abandon();
        }
        result
    }

    fn run_inner(&mut self) -> Result<BuildReport> {
        let Self {
            source_root,
            out_dir,
            config,
            options,
            engines,
            vendor,
            reporter,
        } = self;
        let reporter: &mut dyn ProgressReporter = &mut **reporter;

        let ignore = config.effective_ignore();
        let sources = discovery::discover(source_root, &ignore)?;

        let libraries = LibraryMatcher::new(&config.libraries)?;
        let profiles: Vec<&TargetProfile> = options
            .selected()
            .into_iter()
            .filter_map(|id| config.target(id))
            .collect();
        let mut report = BuildReport::new(profiles.iter().map(|p| p.id).collect());

        fs::create_dir_all(&*out_dir).map_err(|e| BuildError::OutputRootFailed {
            path: out_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        reporter.banner(&format!(
            "Replicating source ({} files) into {} target(s)",
            sources.len(),
            profiles.len()
        ));
        let roots: Vec<PathBuf> = profiles.iter().map(|p| p.root(out_dir)).collect();
        discovery::replicate(source_root, &roots, &ignore)?;

        for (profile, root) in profiles.iter().zip(&roots) {
            if profile.is_downleveled() {
                reporter.banner(&format!("Building {} (downleveled)", profile.id));
                let mut target = TargetRun {
                    profile,
                    root,
                    engines,
                    reporter: &mut *reporter,
                    report: &mut report,
                };
                target.pages(config, &libraries, vendor);
                target.scripts();
                target.styles();
            } else {
                reporter.banner(&format!("Building {} (minify only)", profile.id));
                TargetRun {
                    profile,
                    root,
                    engines,
                    reporter: &mut *reporter,
                    report: &mut report,
                }
                .minify_only();
            }
        }

        tracing::debug!(libraries = vendor.records().len(), "vendoring finished");

        for (profile, root) in profiles.iter().zip(&roots) {
            if !profile.legacy_flex_prefix {
                continue;
            }
            reporter.banner(&format!("Post-minification sweep ({})", profile.id));
            match postpatch::sweep(root) {
                Ok(changed) => tracing::debug!(target_id = %profile.id, changed, "sweep finished"),
                Err(e) => {
                    tracing::warn!(target_id = %profile.id, error = %e, "post-minification sweep failed");
                    report.warn(format!("{}: post-minification sweep failed: {e}", profile.id));
                }
            }
        }

        if options.sitemap {
            reporter.banner("Generating sitemaps");
            for (profile, root) in profiles.iter().zip(&roots) {
                if let Err(e) = sitemap::generate(root, &profile.domain) {
                    tracing::warn!(target_id = %profile.id, error = %e, "sitemap generation failed");
                    report.warn(format!("{}: sitemap generation failed: {e}", profile.id));
                }
            }
        }

        if let Err(e) = report.write(out_dir) {
            tracing::warn!(error = %e, "failed to write build report");
        }

        let passed_through = report
            .files
            .iter()
            .filter(|f| f.status == FileStatus::PassedThroughOnError)
            .count();
        let fallback = report
            .files
            .iter()
            .filter(|f| f.status == FileStatus::TransformedWithFallback)
            .count();
        reporter.summary(&format!(
            "Built {} file(s): {} with fallback, {} passed through",
            report.files.len(),
            fallback,
            passed_through
        ));

        Ok(report)
    }
}

/// File passes over one target root
struct TargetRun<'a> {
    profile: &'a TargetProfile,
    root: &'a Path,
    engines: &'a Engines,
    reporter: &'a mut dyn ProgressReporter,
    report: &'a mut BuildReport,
}

impl TargetRun<'_> {
    fn pages(&mut self, config: &BuildConfig, libraries: &LibraryMatcher, vendor: &mut LibraryVendor) {
        let files = discovery::files_with_extension(self.root, &["html", "htm"]);
        self.reporter
            .start_pass(&format!("{} pages", self.profile.id), files.len() as u64);

        let mut transformer =
            PageTransformer::new(self.profile, self.root, config, libraries, self.engines, vendor);
        let stages: Vec<&str> = transformer.stages().iter().map(|s| s.name()).collect();
        tracing::debug!(target_id = %self.profile.id, ?stages, "page pipeline");
        for path in files {
            let relative = self.relative(&path);
            match fs::read_to_string(&path) {
                Ok(original) => {
                    let outcome = transformer.transform(&relative, &original);
                    let mut warnings = outcome.warnings;
                    let mut status = outcome.status;
                    if let Err(e) = fs::write(&path, outcome.html) {
                        warnings.push(BuildError::write(&path, &e).to_string());
                        status = FileStatus::PassedThroughOnError;
                    }
                    self.report.record(self.profile.id, &relative, status, warnings);
                }
                Err(e) => self.unreadable(&path, &relative, &e),
            }
            self.reporter.file_done(&relative.display().to_string());
        }
        self.reporter.finish_pass();
    }

    fn scripts(&mut self) {
        let (profile, engines) = (self.profile, self.engines);
        let engine = engines.js.as_ref();
        self.each_file(&["js"], "scripts", |_, code| {
            let source = detect_source(engine, code);
            transform_js(engine, &engines.obfuscation, code, profile, source)
        });
    }

    fn styles(&mut self) {
        let (profile, engines) = (self.profile, self.engines);
        self.each_file(&["css"], "styles", |_, css| {
            transform_css(engines.css.as_ref(), css, profile)
        });
    }

    fn minify_only(&mut self) {
        let engines = self.engines;
        let engine = engines.js.as_ref();
        self.each_file(&["html", "htm", "css", "js"], "files", |path, content| {
            match path.extension().and_then(|e| e.to_str()) {
                Some("css") => Transformed::ok(minify_css(content)),
                Some("js") => strip_js(engine, content, detect_source(engine, content)),
                _ => match minify_html(engine, content) {
                    Ok(html) => Transformed::ok(html),
                    Err(e) => Transformed::fallback(content.to_string(), e.to_string()),
                },
            }
        });
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(self.root).unwrap_or(path).to_path_buf()
    }

    fn unreadable(&mut self, path: &Path, relative: &Path, err: &std::io::Error) {
        let error = BuildError::read(path, err);
        tracing::warn!(error = %error, "skipping unreadable file");
        self.report.record(
            self.profile.id,
            relative,
            FileStatus::PassedThroughOnError,
            vec![error.to_string()],
        );
    }

    fn each_file(
        &mut self,
        extensions: &[&str],
        label: &str,
        mut transform: impl FnMut(&Path, &str) -> Transformed,
    ) {
        let files = discovery::files_with_extension(self.root, extensions);
        self.reporter
            .start_pass(&format!("{} {label}", self.profile.id), files.len() as u64);

        for path in files {
            let relative = self.relative(&path);
            match fs::read_to_string(&path) {
                Ok(content) => {
                    let out = transform(&path, &content);
                    let mut warnings: Vec<String> = out.fallback.iter().cloned().collect();
                    let mut status = FileStatus::from_fallback(out.fell_back());
                    if out.code != content {
                        if let Err(e) = fs::write(&path, &out.code) {
                            warnings.push(BuildError::write(&path, &e).to_string());
                            status = FileStatus::PassedThroughOnError;
                        }
                    }
                    self.report.record(self.profile.id, &relative, status, warnings);
                }
                Err(e) => self.unreadable(&path, &relative, &e),
            }
            self.reporter.file_done(&relative.display().to_string());
        }
        self.reporter.finish_pass();
    }
}
