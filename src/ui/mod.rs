//! Build progress presentation
//!
//! This module handles:
//! - Named stage banners on stdout
//! - Per-target file progress bars using indicatif
//! - Silent progress for `--quiet` runs and tests
//!
//! All progress reporting goes through the ProgressReporter trait, so the
//! orchestrator never talks to the terminal directly.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter for a build run
pub trait ProgressReporter {
    /// Announce a pipeline stage
    fn banner(&mut self, title: &str);

    /// Start a file pass over `total` files
    fn start_pass(&mut self, label: &str, total: u64);

    /// One file of the current pass is done
    fn file_done(&mut self, path: &str);

    /// Finish the current pass
    fn finish_pass(&mut self);

    /// Print a closing summary line
    fn summary(&mut self, message: &str);

    /// Abandon on error
    fn abandon(&mut self);
}

/// Interactive reporter with styled banners and progress bars
#[derive(Default)]
pub struct InteractiveProgressReporter {
    pass: Option<ProgressBar>,
}

impl InteractiveProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for InteractiveProgressReporter {
    fn banner(&mut self, title: &str) {
        println!(
            "{} {}",
            Style::new().bold().green().apply_to("==>"),
            Style::new().bold().apply_to(title)
        );
    }

    fn start_pass(&mut self, label: &str, total: u64) {
        let style = ProgressStyle::with_template("  [{bar:40.cyan/blue}] {pos}/{len} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb.set_prefix(label.to_string());
        self.pass = Some(pb);
    }

    fn file_done(&mut self, path: &str) {
        if let Some(ref pb) = self.pass {
            // Truncate long paths for display
            let display_path = if path.chars().count() > 50 {
                let tail: String = path.chars().rev().take(47).collect::<Vec<_>>().into_iter().rev().collect();
                format!("...{tail}")
            } else {
                path.to_string()
            };
            pb.set_message(display_path);
            pb.inc(1);
        }
    }

    fn finish_pass(&mut self) {
        if let Some(pb) = self.pass.take() {
            pb.finish_and_clear();
        }
    }

    fn summary(&mut self, message: &str) {
        println!("{}", Style::new().bold().apply_to(message));
    }

    fn abandon(&mut self) {
        if let Some(pb) = self.pass.take() {
            pb.abandon();
        }
    }
}

/// Silent progress reporter for `--quiet` and tests
#[derive(Default)]
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn banner(&mut self, _title: &str) {}

    fn start_pass(&mut self, _label: &str, _total: u64) {}

    fn file_done(&mut self, _path: &str) {}

    fn finish_pass(&mut self) {}

    fn summary(&mut self, _message: &str) {}

    fn abandon(&mut self) {}
}
