//! Command implementations for the retrobuild CLI

pub mod build;
pub mod clean;
pub mod completions;
pub mod targets;
