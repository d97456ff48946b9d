use clap::Parser;
use std::path::PathBuf;

use crate::config::TargetId;

/// Arguments for the build command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Build every target into dist/:\n    retrobuild build\n\n\
                  Build one target from another directory:\n    retrobuild build --root site --only lite\n\n\
                  Build into a custom directory without sitemaps:\n    retrobuild build --out /tmp/out --no-sitemap")]
pub struct BuildArgs {
    /// Source root of the site
    #[arg(long, short = 'r', default_value = ".", env = "RETROBUILD_ROOT")]
    pub root: PathBuf,

    /// Configuration file (defaults to retrobuild.yaml at the source root)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Output directory, overriding the configured one
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Build only these targets (repeatable)
    #[arg(long, value_name = "TARGET")]
    pub only: Vec<TargetId>,

    /// Skip sitemap generation
    #[arg(long)]
    pub no_sitemap: bool,

    /// Suppress banners and progress bars
    #[arg(long, short = 'q')]
    pub quiet: bool,
}
