//! Retrobuild - multi-target static site builder
//!
//! Replicates one static web app into a `main`, `lite`, and `legacy` output
//! root and downlevels the constrained copies for older browsers.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod build;
mod cli;
mod commands;
mod config;
mod discovery;
mod error;
mod hash;
mod html;
mod page;
mod postpatch;
mod report;
mod sitemap;
mod transform;
mod ui;
mod vendor;

use cli::{Cli, Commands};

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "RETROBUILD_LOG";

fn init_logging(verbose: bool) {
    let default = if verbose { "retrobuild=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build(args) => commands::build::run(args),
        Commands::Clean(args) => commands::clean::run(&args),
        Commands::Targets(args) => commands::targets::run(&args),
        Commands::Completions(args) => commands::completions::run(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
