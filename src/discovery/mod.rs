//! Asset discovery and replication
//!
//! This module handles:
//! - Enumerating source files minus the configured ignore list
//! - Copying the source tree into every selected output root, all-or-nothing
//! - Clearing previously generated roots (vendored `libs/` caches first)
//! - Listing files of a given kind inside an output root

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{BuildError, Result};

pub mod staging;

pub use staging::StagedRoot;

/// Directory inside every output root holding vendored libraries
pub const LIBS_DIR: &str = "libs";

fn is_ignored_top_level(entry: &DirEntry, ignore: &[String]) -> bool {
    entry.depth() == 1
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ignore.iter().any(|i| i == name))
}

/// Discover all non-ignored files under `source_root`, as sorted relative paths
pub fn discover(source_root: &Path, ignore: &[String]) -> Result<Vec<PathBuf>> {
    if !source_root.is_dir() {
        return Err(BuildError::SourceNotFound {
            path: source_root.display().to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source_root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_ignored_top_level(e, ignore))
    {
        let entry = entry.map_err(|e| BuildError::FileReadFailed {
            path: source_root.display().to_string(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(source_root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(relative);
        }
    }

    files.sort();
    Ok(files)
}

/// Remove a previously generated output root, vendored libraries first
pub fn clear_output_root(root: &Path) -> Result<()> {
    let libs = root.join(LIBS_DIR);
    if libs.exists() {
        fs::remove_dir_all(&libs).map_err(|e| BuildError::OutputRootFailed {
            path: libs.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    if root.exists() {
        fs::remove_dir_all(root).map_err(|e| BuildError::OutputRootFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Replicate `source_root` into each destination root independently
///
/// Every destination is populated through a [`StagedRoot`]: a copy failure
/// aborts the run and leaves no partial tree behind.
pub fn replicate(source_root: &Path, dest_roots: &[PathBuf], ignore: &[String]) -> Result<()> {
    if !source_root.is_dir() {
        return Err(BuildError::SourceNotFound {
            path: source_root.display().to_string(),
        });
    }

    for dest in dest_roots {
        clear_output_root(dest)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::OutputRootFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let staged = StagedRoot::begin(dest)?;
        copy_tree(source_root, staged.path(), ignore)?;
        staged.commit()?;
        tracing::debug!(dest = %dest.display(), "replicated source tree");
    }

    Ok(())
}

fn copy_tree(src_root: &Path, dst_root: &Path, ignore: &[String]) -> Result<()> {
    for entry in WalkDir::new(src_root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_ignored_top_level(e, ignore))
    {
        let entry = entry.map_err(|e| BuildError::CopyFailed {
            from: src_root.display().to_string(),
            to: dst_root.display().to_string(),
            reason: e.to_string(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(src_root)
            .unwrap_or(entry.path());
        let dst = dst_root.join(relative);

        let copied = if entry.file_type().is_dir() {
            fs::create_dir_all(&dst)
        } else {
            dst.parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::copy(entry.path(), &dst).map(|_| ()))
        };

        copied.map_err(|e| BuildError::CopyFailed {
            from: entry.path().display().to_string(),
            to: dst.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

/// Files under `root` with one of `extensions`, skipping vendored libraries
pub fn files_with_extension(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == LIBS_DIR))
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|x| ext.eq_ignore_ascii_case(x)))
        })
        .map(DirEntry::into_path)
        .collect();

    files.sort();
    files
}
