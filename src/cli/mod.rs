//! CLI definitions using clap derive API
//!
//! This module is organized into submodules for each command's argument types:
//! - build: Build command arguments
//! - clean: Clean command arguments
//! - targets: Targets command arguments
//! - completions: Completions command arguments

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};

pub mod build;
pub mod clean;
pub mod completions;
pub mod targets;

pub use build::BuildArgs;
pub use clean::CleanArgs;
pub use completions::CompletionsArgs;
pub use targets::TargetsArgs;

/// Retrobuild - multi-target static site builder
///
/// Produces the main, lite, and legacy builds of the site from one source tree.
#[derive(Parser, Debug)]
#[command(
    name = "retrobuild",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Build main, lite, and legacy variants of a static web app",
    long_about = "Retrobuild replicates a static site into one output root per browser tier \
                  and downlevels the lite and legacy copies: vendored libraries, polyfills, \
                  transpiled scripts and styles, and per-page layout patches.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  retrobuild build                        \x1b[90m# Build all targets into dist/\x1b[0m\n   \
                  retrobuild build --only legacy          \x1b[90m# Rebuild only the legacy target\x1b[0m\n   \
                  retrobuild targets                      \x1b[90m# Show the target profile table\x1b[0m\n   \
                  retrobuild clean                        \x1b[90m# Remove generated output\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build target roots from the source tree
    Build(BuildArgs),

    /// Remove generated target roots and the build report
    Clean(CleanArgs),

    /// Show the resolved target profiles
    Targets(TargetsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
