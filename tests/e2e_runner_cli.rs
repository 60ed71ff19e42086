mod common;

use assert_cmd::Command;
use common::cli::{Workspace, path_with, run_strangelove, run_strangelove_with_env};
use predicates::prelude::*;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[test]
fn e2e_help_lists_generated_parameter_flags() {
    let _log = common::test_log("e2e_help_lists_generated_parameter_flags");
    let workspace = Workspace::new();

    let run = run_strangelove(&workspace, ["--help"], "help");
    assert!(run.status.success(), "help failed: {}", run.stderr);
    for needle in [
        "--benchmark",
        "--exp-type",
        "--no-retry-on-zero",
        "Cluster Parameters",
        "--ec2.cluster_tag",
        "--hstore.git_branch",
        "HStoreConf Client Parameters",
        "--client.txnrate",
        "HStoreConf Site Parameters",
        "Codespeed",
    ] {
        assert!(run.stdout.contains(needle), "help is missing {needle}");
    }
    assert!(!run.stdout.contains("--hstore.partitions "));
}

#[test]
fn e2e_version_names_binaries() {
    Command::new(assert_cmd::cargo::cargo_bin!("strangelove"))
        .arg("--version")
        .env_remove("STRANGELOVE_CATALOG")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("strangelove "));

    Command::new(assert_cmd::cargo::cargo_bin!("hstore-files"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--git-branch").and(predicate::str::contains("--copy")));
}

#[test]
fn e2e_rejects_unknown_benchmark_and_experiment() {
    let _log = common::test_log("e2e_rejects_unknown_benchmark_and_experiment");
    let workspace = Workspace::new();

    let run = run_strangelove(&workspace, ["--benchmark", "nosuchbench"], "bad_benchmark");
    assert_eq!(run.status.code(), Some(2));
    assert!(run.stderr.contains("nosuchbench"));

    let run = run_strangelove(
        &workspace,
        ["--benchmark", "tpcc", "--exp-type", "nosuchexp"],
        "bad_exp_type",
    );
    assert_eq!(run.status.code(), Some(2));
    assert!(run.stderr.contains("nosuchexp"));

    let run = run_strangelove(&workspace, ["--partitions", "4"], "missing_benchmark");
    assert_eq!(run.status.code(), Some(2));
    assert!(run.stderr.contains("--benchmark"));
}

#[test]
fn e2e_rejects_mistyped_parameter() {
    let workspace = Workspace::new();
    let run = run_strangelove(
        &workspace,
        ["--benchmark", "tpcc", "--client.txnrate", "fast"],
        "bad_param",
    );
    assert_eq!(run.status.code(), Some(2));
    assert!(run.stderr.contains("client.txnrate"));
}

#[test]
fn e2e_unreadable_catalog_is_config_error() {
    let workspace = Workspace::new();
    let missing = workspace.root.join("missing.yaml");
    let run = run_strangelove_with_env(
        &workspace,
        &[("STRANGELOVE_CATALOG", missing.into_os_string())],
        ["--benchmark", "tpcc"],
        "missing_catalog",
    );
    assert_eq!(run.status.code(), Some(7));
    assert!(run.stderr.contains("Configuration error"));
}

#[test]
fn e2e_custom_catalog_replaces_builtin() {
    let workspace = Workspace::new();
    let catalog = workspace.root.join("catalog.yaml");
    fs::write(
        &catalog,
        "benchmarks: [voter]\n\
         cluster_params:\n  ec2.cluster_tag:\n    type: string\n    default: lab\n\
         experiments:\n  - name: scaling\n  - name: skew\n",
    )
    .expect("write catalog");

    let run = run_strangelove_with_env(
        &workspace,
        &[("STRANGELOVE_CATALOG", catalog.clone().into_os_string())],
        ["--help"],
        "custom_catalog_help",
    );
    assert!(run.status.success(), "help failed: {}", run.stderr);
    assert!(run.stdout.contains("scaling"));
    assert!(run.stdout.contains("skew"));
    assert!(!run.stdout.contains("--client.txnrate"));

    let run = run_strangelove_with_env(
        &workspace,
        &[("STRANGELOVE_CATALOG", catalog.into_os_string())],
        ["--benchmark", "tpcc"],
        "custom_catalog_rejects_tpcc",
    );
    assert_eq!(run.status.code(), Some(2));
}

#[cfg(unix)]
mod fake_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const DESCRIBE_INSTANCES: &str = r#"{"Reservations": [{"Instances": [
  {"InstanceId": "i-site-1", "State": {"Name": "running"}, "InstanceType": "m2.4xlarge",
   "PublicDnsName": "ec2-site-1", "PrivateDnsName": "ip-site-1",
   "Tags": [{"Key": "Name", "Value": "hstore"}, {"Key": "Type", "Value": "site"}]},
  {"InstanceId": "i-client-1", "State": {"Name": "running"}, "InstanceType": "c1.xlarge",
   "PublicDnsName": "ec2-client-1", "PrivateDnsName": "ip-client-1",
   "Tags": [{"Key": "Name", "Value": "hstore"}, {"Key": "Type", "Value": "client"}]}
]}]}"#;

    /// `aws` and `ssh` stand-ins that log every call to `$FAKE_LOG`.
    /// `ssh` prints a controller result for benchmark runs, or exits with
    /// `$FAKE_BENCHMARK_STATUS` when that is set.
    fn install_fake_tools(workspace: &Workspace) -> PathBuf {
        let bin = workspace.root.join("bin");
        fs::create_dir_all(&bin).expect("bin dir");

        write_script(
            &bin.join("aws"),
            &format!(
                "#!/bin/sh\n\
                 printf '%s\\n' \"aws $*\" >> \"$FAKE_LOG\"\n\
                 case \"$*\" in\n\
                 *describe-instances*) cat <<'JSON'\n{DESCRIBE_INSTANCES}\nJSON\n;;\n\
                 esac\n\
                 exit 0\n"
            ),
        );
        write_script(
            &bin.join("ssh"),
            "#!/bin/sh\n\
             printf '%s\\n' \"ssh $*\" >> \"$FAKE_LOG\"\n\
             case \"$*\" in\n\
             *hstore-benchmark*)\n\
               if [ -n \"$FAKE_BENCHMARK_STATUS\" ]; then exit \"$FAKE_BENCHMARK_STATUS\"; fi\n\
               echo '[java] benchmark complete'\n\
               echo '<json>'\n\
               echo '{\"TOTALTXNPERSECOND\": 1500.5, \"MINTXNPERSECOND\": 1200}'\n\
               echo '</json>'\n\
               ;;\n\
             esac\n\
             exit 0\n",
        );
        bin
    }

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).expect("write script");
        let mut perms = fs::metadata(path).expect("script metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod script");
    }

    fn fake_env(workspace: &Workspace, bin: &Path, extra: &[(&'static str, &str)]) -> Vec<(&'static str, OsString)> {
        let mut envs = vec![
            ("PATH", path_with(bin)),
            ("FAKE_LOG", workspace.root.join("calls.log").into_os_string()),
        ];
        envs.extend(extra.iter().map(|(k, v)| (*k, OsString::from(*v))));
        envs
    }

    fn calls(workspace: &Workspace) -> Vec<String> {
        fs::read_to_string(workspace.root.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn e2e_full_run_prints_report() {
        let _log = common::test_log("e2e_full_run_prints_report");
        let workspace = Workspace::new();
        let bin = install_fake_tools(&workspace);

        let run = run_strangelove_with_env(
            &workspace,
            &fake_env(&workspace, &bin, &[]),
            [
                "--benchmark",
                "tpcc",
                "--partitions",
                "2",
                "4",
                "--exp-trials",
                "2",
                "--client.txnrate",
                "5000",
            ],
            "full_run",
        );
        assert!(run.status.success(), "run failed: {}", run.stderr);

        let expected = "MOTIVATION - Partitions 2\n\
                        \x20  TPCC [Attempts:2/6]\n\
                        \x20     TRIAL #0: 1500.5000\n\
                        \x20     TRIAL #1: 1500.5000\n\
                        \n\
                        MOTIVATION - Partitions 4\n\
                        \x20  TPCC [Attempts:2/6]\n\
                        \x20     TRIAL #0: 1500.5000\n\
                        \x20     TRIAL #1: 1500.5000\n\
                        \n";
        assert_eq!(run.stdout, expected);
        assert!(run.stderr.contains("MOTIVATION - TPCC - 2 Partitions"));
        assert!(run.stderr.contains("Throughput: 1500.50"));

        let benchmark_calls: Vec<String> = calls(&workspace)
            .into_iter()
            .filter(|line| line.starts_with("ssh") && line.contains("hstore-benchmark"))
            .collect();
        assert_eq!(benchmark_calls.len(), 4);

        let first = &benchmark_calls[0];
        assert!(first.contains("ubuntu@ec2-client-1"));
        assert!(first.contains("git checkout strangelove"));
        assert!(first.contains("ant hstore-prepare -Dproject=tpcc -Dhosts=ip-site-1:0:0-1"));
        assert!(first.contains(" compile "));
        assert!(first.contains("-Dkillonzero=true"));
        assert!(first.contains("-Dclient.txnrate=5000"));
        assert!(first.contains("-Dbenchmark.neworder_multip=true"));

        assert!(!benchmark_calls[1].contains("hstore-prepare"));
        assert!(!benchmark_calls[1].contains("git checkout"));
        assert!(!benchmark_calls[1].contains(" compile "));
        assert!(benchmark_calls[2].contains("-Dhosts=ip-site-1:0:0-3"));
        assert!(!benchmark_calls[3].contains("hstore-prepare"));

        let ntp_calls = calls(&workspace)
            .into_iter()
            .filter(|line| line.starts_with("ssh") && line.contains("ntpdate"))
            .count();
        assert_eq!(ntp_calls, 2);
    }

    #[test]
    fn e2e_failed_benchmark_stops_run() {
        let workspace = Workspace::new();
        let bin = install_fake_tools(&workspace);

        let run = run_strangelove_with_env(
            &workspace,
            &fake_env(&workspace, &bin, &[("FAKE_BENCHMARK_STATUS", "1")]),
            ["--benchmark", "tpcc", "tm1", "--fast-start"],
            "failed_benchmark",
        );
        assert!(run.status.success(), "run failed: {}", run.stderr);
        assert!(run.stdout.is_empty());
        assert!(run.stderr.contains("Failed to complete trial successfully"));
        assert!(run.stderr.contains("Experiment run stopped early"));

        let benchmark_calls = calls(&workspace)
            .into_iter()
            .filter(|line| line.contains("hstore-benchmark"))
            .count();
        assert_eq!(benchmark_calls, 1);
    }

    #[test]
    fn e2e_unreachable_host_exits_with_ssh_status() {
        let workspace = Workspace::new();
        let bin = install_fake_tools(&workspace);

        let run = run_strangelove_with_env(
            &workspace,
            &fake_env(&workspace, &bin, &[("FAKE_BENCHMARK_STATUS", "255")]),
            ["--benchmark", "tpcc", "--fast-start"],
            "unreachable_host",
        );
        assert_eq!(run.status.code(), Some(255));
        assert!(run.stderr.contains("Command failed: ssh"));
    }

    #[test]
    fn e2e_no_execute_only_starts_cluster() {
        let workspace = Workspace::new();
        let bin = install_fake_tools(&workspace);

        let run = run_strangelove_with_env(
            &workspace,
            &fake_env(&workspace, &bin, &[]),
            ["--benchmark", "tpcc", "--start-cluster", "--no-execute"],
            "no_execute",
        );
        assert!(run.status.success(), "run failed: {}", run.stderr);
        assert!(run.stdout.is_empty());

        let calls = calls(&workspace);
        assert!(calls.iter().any(|line| line.contains("ec2 wait instance-running")));
        assert!(calls.iter().all(|line| !line.starts_with("ssh")));
    }

    #[test]
    fn e2e_log_file_receives_logs() {
        let workspace = Workspace::new();
        let bin = install_fake_tools(&workspace);
        let log_file = workspace.root.join("runner.log");

        let run = run_strangelove_with_env(
            &workspace,
            &fake_env(&workspace, &bin, &[]),
            [
                OsString::from("--benchmark"),
                OsString::from("voter"),
                OsString::from("--exp-trials"),
                OsString::from("1"),
                OsString::from("--fast-start"),
                OsString::from("--log-file"),
                log_file.clone().into_os_string(),
            ],
            "log_file",
        );
        assert!(run.status.success(), "run failed: {}", run.stderr);
        assert!(!run.stderr.contains("Executing VOTER"));

        let logged = fs::read_to_string(&log_file).expect("log file");
        assert!(logged.contains("Executing VOTER Trial #0/1 [attempt=1/3]"));
        assert!(logged.contains("Disconnecting and dumping results"));
    }
}
