//! Fixture repository installer.

use crate::cli::InstallCli;
use crate::error::Result;
use crate::util::process;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// What the installer will do with the target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallAction {
    /// Target exists and `--overwrite` was not given.
    Skip,
    /// Hard-link copy from a local cache.
    Copy { cache: PathBuf },
    Clone { repo: String, branch: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub path: PathBuf,
    /// Delete the existing target first.
    pub remove_existing: bool,
    pub action: InstallAction,
}

impl InstallPlan {
    /// Command that performs the install, if any.
    #[must_use]
    pub fn command(&self) -> Option<Command> {
        match &self.action {
            InstallAction::Skip => None,
            InstallAction::Copy { cache } => {
                let mut cmd = Command::new("cp");
                cmd.arg("-rvl").arg(cache).arg(&self.path);
                Some(cmd)
            }
            InstallAction::Clone { repo, branch } => {
                let mut cmd = Command::new("git");
                cmd.args(["clone", "--branch", branch.as_str(), repo.as_str()])
                    .arg(&self.path);
                Some(cmd)
            }
        }
    }
}

/// Decide what to do from the arguments and the current filesystem.
#[must_use]
pub fn plan_install(args: &InstallCli) -> InstallPlan {
    let exists = args.path.symlink_metadata().is_ok();
    if exists && !args.overwrite {
        return InstallPlan {
            path: args.path.clone(),
            remove_existing: false,
            action: InstallAction::Skip,
        };
    }

    let action = match &args.copy {
        Some(cache) if cache.exists() => InstallAction::Copy {
            cache: cache.clone(),
        },
        Some(cache) => {
            warn!(
                "Local cache directory '{}' does not exist. Falling back to git clone",
                cache.display()
            );
            clone_action(args)
        }
        None => clone_action(args),
    };

    InstallPlan {
        path: args.path.clone(),
        remove_existing: exists,
        action,
    }
}

fn clone_action(args: &InstallCli) -> InstallAction {
    InstallAction::Clone {
        repo: args.git_repo.clone(),
        branch: args.git_branch.clone(),
    }
}

/// Install the repository.
///
/// # Errors
///
/// Returns `Io` if the old target cannot be removed, or `CommandFailed`
/// carrying the exit status of a failed clone or copy.
pub fn execute(args: &InstallCli) -> Result<()> {
    let plan = plan_install(args);
    let Some(mut cmd) = plan.command() else {
        info!(
            "Installation path '{}' already exists. Not overwriting",
            plan.path.display()
        );
        return Ok(());
    };

    if plan.remove_existing {
        warn!("Deleting existing '{}'", plan.path.display());
        remove_path(&plan.path)?;
    }

    info!("{}", process::describe(&cmd));
    process::run_checked(&mut cmd)
}

fn remove_path(path: &Path) -> Result<()> {
    if path.symlink_metadata()?.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}
