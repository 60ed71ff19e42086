//! Scripted collaborators for driving the trial loop without a cluster.

use chrono::{TimeZone, Utc};
use std::collections::{BTreeSet, VecDeque};
use strangelove::cluster::{ClusterControl, ExecOutput, ExecRequest, Instance, InstanceRole};
use strangelove::codespeed::{CodespeedResult, ResultUploader};
use strangelove::config::{Env, ParamValue};
use strangelove::model::Revision;
use strangelove::runner::StopSignal;
use strangelove::{Result, RunnerError};

/// Outcome of one scripted `exec_benchmark` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Successful run reporting this throughput.
    Throughput(f64),
    /// Successful run with this raw stdout.
    Stdout(String),
    /// The benchmark command aborted.
    Fail,
    /// The user hit Ctrl-C during the run.
    Interrupt,
    /// The remote command died from SIGINT before the handler saw it.
    Killed,
    /// Successful run, with Ctrl-C arriving just after it finished.
    ThroughputThenStop(f64),
    /// The host could not be reached.
    Unreachable,
}

/// What the loop asked for on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub project: String,
    pub partitions: Option<ParamValue>,
    pub scalefactor: Option<ParamValue>,
    pub exec_prefix: String,
    pub removals: BTreeSet<String>,
    pub json: bool,
    pub update_jar: bool,
    pub update_conf: bool,
    pub update_repo: bool,
    pub update_log4j: bool,
}

pub struct ScriptedCluster {
    pub steps: VecDeque<Step>,
    /// Used once the script runs out.
    pub fallback: Step,
    pub signal: StopSignal,
    pub clients: Vec<Instance>,
    pub calls: Vec<&'static str>,
    pub requests: Vec<RecordedRequest>,
}

impl ScriptedCluster {
    pub fn new(signal: &StopSignal, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            fallback: Step::Throughput(100.0),
            signal: signal.clone(),
            clients: vec![client("i-client-1"), client("i-client-2")],
            calls: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

pub fn client(id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        public_dns: format!("{id}.compute.example"),
        private_dns: format!("{id}.internal"),
        role: Some(InstanceRole::Client),
    }
}

pub fn json_result(rate: f64) -> String {
    format!("[java] done\n<json>\n{{\"TOTALTXNPERSECOND\": {rate}, \"MINTXNPERSECOND\": 1.0}}\n</json>\n")
}

impl ClusterControl for ScriptedCluster {
    fn start_cluster(&mut self, _env: &Env) -> Result<()> {
        self.calls.push("start_cluster");
        Ok(())
    }

    fn sync_time(&mut self, _env: &Env) -> Result<()> {
        self.calls.push("sync_time");
        Ok(())
    }

    fn clear_logs(&mut self, _env: &Env) -> Result<()> {
        self.calls.push("clear_logs");
        Ok(())
    }

    fn client_instances(&mut self, _env: &Env) -> Result<Vec<Instance>> {
        self.calls.push("client_instances");
        Ok(self.clients.clone())
    }

    fn exec_benchmark(&mut self, host: &Instance, request: &ExecRequest<'_>) -> Result<ExecOutput> {
        self.calls.push("exec_benchmark");
        assert_eq!(host.id, "i-client-1", "first client is the designated host");
        self.requests.push(RecordedRequest {
            project: request.project.to_string(),
            partitions: request.env.get("hstore.partitions").cloned(),
            scalefactor: request.env.get("client.scalefactor").cloned(),
            exec_prefix: request
                .env
                .get("hstore.exec_prefix")
                .map(ToString::to_string)
                .unwrap_or_default(),
            removals: request.removals.clone(),
            json: request.json,
            update_jar: request.update_jar,
            update_conf: request.update_conf,
            update_repo: request.update_repo,
            update_log4j: request.update_log4j,
        });

        let step = self.steps.pop_front().unwrap_or_else(|| self.fallback.clone());
        match step {
            Step::Throughput(rate) => Ok(ExecOutput {
                stdout: json_result(rate),
                workloads: vec!["obj/workloads/tpcc.trace".to_string()],
            }),
            Step::Stdout(stdout) => Ok(ExecOutput {
                stdout,
                workloads: Vec::new(),
            }),
            Step::Fail => Err(RunnerError::BenchmarkFailed {
                benchmark: request.project.to_string(),
                host: host.to_string(),
                status: Some(1),
            }),
            Step::Interrupt => {
                self.signal.raise();
                Err(RunnerError::BenchmarkFailed {
                    benchmark: request.project.to_string(),
                    host: host.to_string(),
                    status: Some(130),
                })
            }
            Step::Killed => Err(RunnerError::Interrupted),
            Step::ThroughputThenStop(rate) => {
                self.signal.raise();
                Ok(ExecOutput {
                    stdout: json_result(rate),
                    workloads: Vec::new(),
                })
            }
            Step::Unreachable => Err(RunnerError::CommandFailed {
                command: format!("ssh {host}"),
                status: Some(255),
            }),
        }
    }

    fn get_version(&mut self, _env: &Env, _host: &Instance) -> Result<Revision> {
        self.calls.push("get_version");
        Ok(Revision {
            commit: "0123abcd".to_string(),
            date: Utc.with_ymd_and_hms(2013, 2, 3, 4, 5, 6).unwrap(),
        })
    }
}

#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: Vec<CodespeedResult>,
    pub reject: bool,
}

impl ResultUploader for RecordingUploader {
    fn upload(&mut self, result: &CodespeedResult) -> Result<()> {
        if self.reject {
            return Err(RunnerError::Upload {
                url: "http://codespeed.test/result/add/".to_string(),
                reason: "500 Internal Server Error".to_string(),
            });
        }
        self.uploads.push(result.clone());
        Ok(())
    }
}
