use assert_cmd::Command;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

#[derive(Debug)]
pub struct BinRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
    pub duration: Duration,
    pub log_path: PathBuf,
}

pub struct Workspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub log_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        let log_dir = root.join("logs");
        fs::create_dir_all(&log_dir).expect("log dir");
        Self {
            temp_dir,
            root,
            log_dir,
        }
    }
}

pub fn run_strangelove<I, S>(workspace: &Workspace, args: I, label: &str) -> BinRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_bin(
        assert_cmd::cargo::cargo_bin!("strangelove"),
        workspace,
        &[],
        args,
        label,
    )
}

/// Run the runner with extra environment variables.
pub fn run_strangelove_with_env<I, S>(
    workspace: &Workspace,
    envs: &[(&str, OsString)],
    args: I,
    label: &str,
) -> BinRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_bin(
        assert_cmd::cargo::cargo_bin!("strangelove"),
        workspace,
        envs,
        args,
        label,
    )
}

/// `PATH` with `dir` searched first.
pub fn path_with(dir: &Path) -> OsString {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).expect("join PATH")
}

pub fn run_hstore_files<I, S>(workspace: &Workspace, args: I, label: &str) -> BinRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_bin(
        assert_cmd::cargo::cargo_bin!("hstore-files"),
        workspace,
        &[],
        args,
        label,
    )
}

fn run_bin<I, S>(
    bin: &Path,
    workspace: &Workspace,
    envs: &[(&str, OsString)],
    args: I,
    label: &str,
) -> BinRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(bin);
    cmd.current_dir(&workspace.root);
    cmd.args(args);
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_LOG", "strangelove=debug");
    cmd.env("RUST_BACKTRACE", "1");
    cmd.env("HOME", &workspace.root);
    cmd.env_remove("STRANGELOVE_CATALOG");
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let start = Instant::now();
    let output = cmd.output().expect("run binary");
    let duration = start.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_path = workspace.log_dir.join(format!("{label}.log"));
    let log_body = format!(
        "label: {label}\nstarted: {:?}\nduration: {:?}\nstatus: {}\nargs: {:?}\ncwd: {}\n\nstdout:\n{}\n\nstderr:\n{}\n",
        SystemTime::now(),
        duration,
        output.status,
        cmd.get_args().collect::<Vec<_>>(),
        workspace.root.display(),
        stdout,
        stderr
    );
    fs::write(&log_path, log_body).expect("write log");

    BinRun {
        stdout,
        stderr,
        status: output.status,
        duration,
        log_path,
    }
}
