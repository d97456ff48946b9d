//! Clean command

use std::fs;

use crate::build::BuildOptions;
use crate::cli::CleanArgs;
use crate::config::BuildConfig;
use crate::discovery;
use crate::error::{BuildError, Result};
use crate::report::REPORT_FILE_NAME;

/// Remove generated target roots
///
/// Without `--only` the build report goes too, and the output directory
/// itself when nothing else is left in it.
pub fn run(args: &CleanArgs) -> Result<()> {
    let config = BuildConfig::load(&args.root, args.config.as_deref())?;
    let out_dir = config.out_dir(&args.root);
    let options = BuildOptions {
        only: args.only.clone(),
        ..BuildOptions::default()
    };

    for id in options.selected() {
        let Some(profile) = config.target(id) else {
            continue;
        };
        let root = profile.root(&out_dir);
        if root.exists() {
            discovery::clear_output_root(&root)?;
            println!("Removed {}", root.display());
        }
    }

    if args.only.is_empty() {
        let report = out_dir.join(REPORT_FILE_NAME);
        if report.exists() {
            fs::remove_file(&report).map_err(|e| BuildError::write(&report, &e))?;
        }
        let empty = fs::read_dir(&out_dir).is_ok_and(|mut entries| entries.next().is_none());
        if empty {
            fs::remove_dir(&out_dir).map_err(|e| BuildError::write(&out_dir, &e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetId;
    use tempfile::TempDir;

    fn populated() -> TempDir {
        let temp = TempDir::new().unwrap();
        for dir in ["main", "lite", "legacy"] {
            let root = temp.path().join("dist").join(dir);
            fs::create_dir_all(root.join("libs")).unwrap();
            fs::write(root.join("index.html"), "<html></html>").unwrap();
        }
        fs::write(temp.path().join("dist").join(REPORT_FILE_NAME), "{}").unwrap();
        temp
    }

    #[test]
    fn test_clean_everything() {
        let temp = populated();
        let args = CleanArgs {
            root: temp.path().to_path_buf(),
            config: None,
            only: Vec::new(),
        };
        run(&args).unwrap();
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_clean_only_one_target() {
        let temp = populated();
        let args = CleanArgs {
            root: temp.path().to_path_buf(),
            config: None,
            only: vec![TargetId::Legacy],
        };
        run(&args).unwrap();

        let dist = temp.path().join("dist");
        assert!(!dist.join("legacy").exists());
        assert!(dist.join("lite/index.html").is_file());
        assert!(dist.join(REPORT_FILE_NAME).is_file());
    }

    #[test]
    fn test_clean_without_output_is_noop() {
        let temp = TempDir::new().unwrap();
        let args = CleanArgs {
            root: temp.path().to_path_buf(),
            config: None,
            only: Vec::new(),
        };
        assert!(run(&args).is_ok());
    }
}
