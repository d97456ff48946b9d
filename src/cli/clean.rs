use clap::Parser;
use std::path::PathBuf;

use crate::config::TargetId;

/// Arguments for the clean command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Remove all generated output:\n    retrobuild clean\n\n\
                  Remove only the legacy root:\n    retrobuild clean --only legacy")]
pub struct CleanArgs {
    /// Source root of the site
    #[arg(long, short = 'r', default_value = ".", env = "RETROBUILD_ROOT")]
    pub root: PathBuf,

    /// Configuration file (defaults to retrobuild.yaml at the source root)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Remove only these targets (repeatable)
    #[arg(long, value_name = "TARGET")]
    pub only: Vec<TargetId>,
}
