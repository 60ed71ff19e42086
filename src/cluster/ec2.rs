//! EC2 cluster driver: `aws` CLI for instance lifecycle, `ssh` for
//! remote commands.

use super::{ClusterControl, ExecOutput, ExecRequest, Instance, InstanceRole};
use crate::config::{Env, ParamValue};
use crate::error::{Result, RunnerError};
use crate::model::Revision;
use crate::util::git::{REVISION_FORMAT, parse_revision};
use crate::util::process;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::process::{Command, ExitStatus};
use tracing::{debug, info, warn};

/// Controller configuration file, relative to the checkout.
const CONF_FILE: &str = "properties/default.properties";

/// Key prefixes forwarded to the benchmark controller.
const CONTROLLER_PREFIXES: &[&str] = &["site", "client", "global", "benchmark"];

/// ssh exits 255 when the connection itself fails.
const SSH_TRANSPORT_FAILURE: i32 = 255;
#[cfg(unix)]
const SIGINT: i32 = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    state: InstanceState,
    #[serde(default)]
    instance_type: String,
    #[serde(default)]
    public_dns_name: String,
    #[serde(default)]
    private_dns_name: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceState {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

impl Ec2Instance {
    fn role(&self) -> Option<InstanceRole> {
        self.tags
            .iter()
            .find(|tag| tag.key == "Type")
            .and_then(|tag| InstanceRole::from_tag(&tag.value))
    }

    fn is_running(&self) -> bool {
        self.state.name == "running"
    }

    fn to_instance(&self) -> Instance {
        Instance {
            id: self.instance_id.clone(),
            public_dns: self.public_dns_name.clone(),
            private_dns: self.private_dns_name.clone(),
            role: self.role(),
        }
    }
}

/// Cluster driver for instances tagged `Name=<ec2.cluster_tag>`.
#[derive(Debug, Clone, Default)]
pub struct Ec2Cluster {
    force_reboot: bool,
    /// Project and host layout of the last successful `hstore-prepare`.
    prepared: Option<(String, String)>,
}

impl Ec2Cluster {
    #[must_use]
    pub const fn new(force_reboot: bool) -> Self {
        Self {
            force_reboot,
            prepared: None,
        }
    }

    fn aws(env: &Env, args: &[&str]) -> Result<String> {
        let region = param(env, "ec2.region");
        let mut cmd = Command::new("aws");
        if !region.is_empty() {
            cmd.args(["--region", region.as_str()]);
        }
        cmd.args(["--output", "json"]).args(args);
        process::capture_checked(&mut cmd)
    }

    fn describe(env: &Env) -> Result<Vec<Ec2Instance>> {
        let filter = format!("Name=tag:Name,Values={}", param(env, "ec2.cluster_tag"));
        let stdout = Self::aws(env, &["ec2", "describe-instances", "--filters", filter.as_str()])?;
        let parsed: DescribeInstances = serde_json::from_str(&stdout)?;
        Ok(parsed
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .filter(|inst| !matches!(inst.state.name.as_str(), "terminated" | "shutting-down"))
            .collect())
    }

    fn running(env: &Env) -> Result<Vec<Instance>> {
        Ok(Self::describe(env)?
            .iter()
            .filter(|inst| inst.is_running())
            .map(Ec2Instance::to_instance)
            .collect())
    }

    fn ssh(env: &Env, host: &Instance, script: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args([
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=ERROR",
        ]);
        let key = param(env, "ec2.ssh_key");
        if !key.is_empty() {
            cmd.args(["-i", key.as_str()]);
        }
        let address = if host.public_dns.is_empty() {
            &host.private_dns
        } else {
            &host.public_dns
        };
        cmd.arg(format!("{}@{address}", param(env, "ec2.ssh_user")))
            .arg(script);
        cmd
    }

    fn run_everywhere(env: &Env, script: &str) -> Result<()> {
        for host in Self::running(env)? {
            debug!(host = %host, script, "Remote command");
            process::capture_checked(&mut Self::ssh(env, &host, script))?;
        }
        Ok(())
    }

    fn list_workloads(env: &Env, host: &Instance) -> Result<Vec<String>> {
        let temp_dir = match param(env, "global.temp_dir") {
            dir if dir.is_empty() => "obj".to_string(),
            dir => dir,
        };
        let script = format!(
            "ls -1d {}/{}/workloads/*.trace 2>/dev/null || true",
            shell_quote(&param(env, "hstore.basedir")),
            shell_quote(&temp_dir)
        );
        let stdout = process::capture_checked(&mut Self::ssh(env, host, &script))?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl ClusterControl for Ec2Cluster {
    fn start_cluster(&mut self, env: &Env) -> Result<()> {
        let tag = param(env, "ec2.cluster_tag");
        let instances = Self::describe(env)?;
        if instances.is_empty() {
            return Err(RunnerError::Config(format!(
                "no EC2 instances tagged Name={tag}"
            )));
        }

        let stopped: Vec<&Ec2Instance> = instances
            .iter()
            .filter(|inst| inst.state.name == "stopped")
            .collect();

        if env.get("ec2.change_type").and_then(ParamValue::as_bool) == Some(true) {
            for inst in &stopped {
                let wanted = match inst.role() {
                    Some(InstanceRole::Site) => param(env, "ec2.site_type"),
                    Some(InstanceRole::Client) => param(env, "ec2.client_type"),
                    None => continue,
                };
                if wanted.is_empty() || wanted == inst.instance_type {
                    continue;
                }
                info!(
                    "Changing {} from {} to {wanted}",
                    inst.instance_id, inst.instance_type
                );
                let value = format!("Value={wanted}");
                Self::aws(
                    env,
                    &[
                        "ec2",
                        "modify-instance-attribute",
                        "--instance-id",
                        inst.instance_id.as_str(),
                        "--instance-type",
                        value.as_str(),
                    ],
                )?;
            }
        }

        if !stopped.is_empty() {
            info!("Starting {} stopped instance(s)", stopped.len());
            let mut args = vec!["ec2", "start-instances", "--instance-ids"];
            args.extend(stopped.iter().map(|inst| inst.instance_id.as_str()));
            Self::aws(env, &args)?;
        }

        if self.force_reboot {
            let running: Vec<&str> = instances
                .iter()
                .filter(|inst| inst.is_running())
                .map(|inst| inst.instance_id.as_str())
                .collect();
            if !running.is_empty() {
                warn!("Rebooting {} running instance(s)", running.len());
                let mut args = vec!["ec2", "reboot-instances", "--instance-ids"];
                args.extend(running);
                Self::aws(env, &args)?;
            }
        }

        let mut args = vec!["ec2", "wait", "instance-running", "--instance-ids"];
        args.extend(instances.iter().map(|inst| inst.instance_id.as_str()));
        Self::aws(env, &args)?;
        info!("Cluster '{tag}' is running ({} instances)", instances.len());
        Ok(())
    }

    fn sync_time(&mut self, env: &Env) -> Result<()> {
        info!("Synchronizing instance clocks");
        Self::run_everywhere(env, &param(env, "ec2.ntp_command"))
    }

    fn clear_logs(&mut self, env: &Env) -> Result<()> {
        info!("Clearing controller logs");
        let script = format!(
            "rm -rf {}/{}/*",
            shell_quote(&param(env, "hstore.basedir")),
            shell_quote(&param(env, "hstore.log_dir"))
        );
        Self::run_everywhere(env, &script)
    }

    fn client_instances(&mut self, env: &Env) -> Result<Vec<Instance>> {
        let mut clients: Vec<Instance> = Self::running(env)?
            .into_iter()
            .filter(|inst| inst.role == Some(InstanceRole::Client))
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clients)
    }

    fn exec_benchmark(&mut self, host: &Instance, request: &ExecRequest<'_>) -> Result<ExecOutput> {
        let mut sites: Vec<Instance> = Self::running(request.env)?
            .into_iter()
            .filter(|inst| inst.role == Some(InstanceRole::Site))
            .collect();
        sites.sort_by(|a, b| a.id.cmp(&b.id));
        let layout = host_layout(
            &sites,
            int_param(request.env, "hstore.partitions")?,
            int_param(request.env, "hstore.partitions_per_site")?,
        )?;

        let current = (request.project.to_string(), layout);
        let prepare = request.update_jar || self.prepared.as_ref() != Some(&current);
        let script = benchmark_script(request, prepare.then_some(current.1.as_str()));
        debug!(host = %host, script = %script, "Executing benchmark");

        let output = process::capture(&mut Self::ssh(request.env, host, &script))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if killed_by_interrupt(output.status) {
            return Err(RunnerError::Interrupted);
        }
        match output.status.code() {
            Some(0) => {}
            Some(SSH_TRANSPORT_FAILURE) => {
                return Err(RunnerError::CommandFailed {
                    command: format!("ssh {host}"),
                    status: Some(SSH_TRANSPORT_FAILURE),
                });
            }
            status => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                debug!(stdout = %stdout, stderr = %stderr, "Benchmark output");
                return Err(RunnerError::BenchmarkFailed {
                    benchmark: request.project.to_string(),
                    host: host.to_string(),
                    status,
                });
            }
        }
        self.prepared = Some(current);

        let workloads = if request.trace {
            Self::list_workloads(request.env, host)?
        } else {
            Vec::new()
        };
        Ok(ExecOutput { stdout, workloads })
    }

    fn get_version(&mut self, env: &Env, host: &Instance) -> Result<Revision> {
        let script = format!(
            "cd {} && git show -s {REVISION_FORMAT} HEAD",
            shell_quote(&param(env, "hstore.basedir"))
        );
        let stdout = process::capture_checked(&mut Self::ssh(env, host, &script))?;
        parse_revision(&stdout)
    }
}

fn param(env: &Env, key: &str) -> String {
    env.get(key).map(ToString::to_string).unwrap_or_default()
}

fn int_param(env: &Env, key: &str) -> Result<u32> {
    env.get(key)
        .and_then(ParamValue::as_i64)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .ok_or_else(|| RunnerError::invalid_parameter(key, "expected a positive integer"))
}

/// Controller `hosts` layout placing `partitions` partitions on `sites`,
/// `per_site` at a time: `host:site:first-last` entries joined by `;`.
///
/// # Errors
///
/// Returns `Config` when there are too few sites for the partition count.
pub fn host_layout(sites: &[Instance], partitions: u32, per_site: u32) -> Result<String> {
    let needed = partitions.div_ceil(per_site) as usize;
    if sites.len() < needed {
        return Err(RunnerError::Config(format!(
            "{partitions} partitions need {needed} site instance(s) at {per_site} per site; {} running",
            sites.len()
        )));
    }

    let entries: Vec<String> = sites
        .iter()
        .take(needed)
        .zip(0u32..)
        .map(|(site, site_id)| {
            let first = site_id * per_site;
            let last = (first + per_site).min(partitions) - 1;
            let address = if site.private_dns.is_empty() {
                &site.public_dns
            } else {
                &site.private_dns
            };
            format!("{address}:{site_id}:{first}-{last}")
        })
        .collect();
    Ok(entries.join(";"))
}

fn controller_params(env: &Env) -> impl Iterator<Item = (&String, &ParamValue)> {
    env.iter().filter(|(key, _)| {
        key.split('.')
            .next()
            .is_some_and(|prefix| CONTROLLER_PREFIXES.contains(&prefix))
    })
}

fn join_words(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote `s` for a POSIX shell, leaving plain words untouched.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Build the shell script run on the client host for one attempt.
///
/// Steps joined with `&&`, so the first failure is the script's exit
/// status: repository sync, log4j reset, configuration rewrite, project
/// jar build for the `hosts` layout (when given), then the benchmark itself.
#[must_use]
pub fn benchmark_script(request: &ExecRequest<'_>, hosts: Option<&str>) -> String {
    let env = request.env;
    let project = shell_quote(request.project);
    let mut steps = vec![format!("cd {}", shell_quote(&param(env, "hstore.basedir")))];

    if request.update_repo {
        let options = param(env, "hstore.git_options");
        let branch = shell_quote(&param(env, "hstore.git_branch"));
        steps.push(join_words(&["git fetch", &options, "origin"]));
        steps.push(format!("git checkout {branch}"));
        steps.push(join_words(&["git pull", &options, "origin", &branch]));
    }

    if request.update_log4j {
        steps.push("git checkout -- log4j.properties".to_string());
    }

    if request.update_conf {
        let stale: BTreeSet<&str> = request
            .removals
            .iter()
            .map(String::as_str)
            .chain(controller_params(env).map(|(key, _)| key.as_str()))
            .collect();
        if !stale.is_empty() {
            let exprs: Vec<String> = stale
                .iter()
                .map(|key| {
                    let pattern = format!("/^{}[[:space:]]*=/d", key.replace('.', r"\."));
                    format!("-e {}", shell_quote(&pattern))
                })
                .collect();
            steps.push(format!("sed -i {} {CONF_FILE}", exprs.join(" ")));
        }
        let lines: Vec<String> = controller_params(env)
            .map(|(key, value)| shell_quote(&format!("{key} = {value}")))
            .collect();
        if !lines.is_empty() {
            steps.push(format!("printf '%s\\n' {} >> {CONF_FILE}", lines.join(" ")));
        }
    }

    if let Some(hosts) = hosts {
        steps.push(format!(
            "ant hstore-prepare -Dproject={project} -Dhosts={}",
            shell_quote(hosts)
        ));
    }

    let mut run = vec![
        "ant".to_string(),
        param(env, "hstore.exec_prefix"),
        "hstore-benchmark".to_string(),
        format!("-Dproject={project}"),
        format!("-Dclient.output_json={}", request.json),
    ];
    if request.trace {
        run.push("-Dtrace=true".to_string());
    }
    run.extend(
        controller_params(env).map(|(key, value)| shell_quote(&format!("-D{key}={value}"))),
    );
    let run: Vec<&str> = run.iter().map(String::as_str).collect();
    steps.push(join_words(&run));

    steps.join(" && ")
}

/// True when the child died from SIGINT, as ssh does when Ctrl-C reaches
/// the foreground process group.
#[cfg(unix)]
fn killed_by_interrupt(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(SIGINT)
}

#[cfg(not(unix))]
fn killed_by_interrupt(_status: ExitStatus) -> bool {
    false
}
