use clap::Parser;
use std::path::PathBuf;

/// Arguments for the targets command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Show the built-in profiles:\n    retrobuild targets\n\n\
                  Show profiles after retrobuild.yaml overrides:\n    retrobuild targets --root site")]
pub struct TargetsArgs {
    /// Source root of the site
    #[arg(long, short = 'r', default_value = ".", env = "RETROBUILD_ROOT")]
    pub root: PathBuf,

    /// Configuration file (defaults to retrobuild.yaml at the source root)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}
