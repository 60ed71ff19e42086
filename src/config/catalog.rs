//! Parameter catalog: the typed schema behind the generated CLI flags,
//! plus the built-in configuration layers.

use super::{Layer, ParamType, ParamValue};
use crate::error::{Result, RunnerError};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Environment variable naming a replacement catalog file.
pub const CATALOG_ENV_VAR: &str = "STRANGELOVE_CATALOG";

const BUILTIN_CATALOG: &str = include_str!("catalog.yaml");

/// Heading for generated cluster flags.
const CLUSTER_HEADING: &str = "Cluster Parameters";

/// Cluster-table prefixes that get a generated flag.
const CLUSTER_PREFIXES: &[&str] = &["ec2", "hstore"];

/// Schema entry for one parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub default: Option<ParamValue>,
    #[serde(default)]
    pub help: Option<String>,
    /// Whether a CLI flag is generated for this entry.
    #[serde(default = "default_true")]
    pub cli: bool,
}

const fn default_true() -> bool {
    true
}

/// A named bundle of experiment-specific overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentSpec {
    pub name: String,
    #[serde(default)]
    pub settings: Layer,
}

/// A generated command-line flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CliParam {
    pub key: String,
    pub spec: ParamSpec,
    pub heading: String,
}

/// Everything the runner knows about parameters before parsing arguments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Catalog {
    pub benchmarks: Vec<String>,
    #[serde(default)]
    pub cluster_params: BTreeMap<String, ParamSpec>,
    #[serde(default)]
    pub hstore_params: BTreeMap<String, ParamSpec>,
    #[serde(default)]
    pub default_options: Layer,
    #[serde(default)]
    pub base_settings: Layer,
    pub experiments: Vec<ExperimentSpec>,
    #[serde(default)]
    pub debug_options: Vec<String>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded YAML is invalid.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not parse or fails validation.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(contents)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            RunnerError::Config(format!("cannot read catalog '{}': {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Honor `STRANGELOVE_CATALOG` when set, else use the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected catalog is unreadable or invalid.
    pub fn discover() -> Result<Self> {
        match env::var(CATALOG_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(path = %value, "Loading catalog from {CATALOG_ENV_VAR}");
                Self::load(Path::new(value.trim()))
            }
            _ => Self::builtin(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.benchmarks.is_empty() {
            return Err(RunnerError::Config("catalog lists no benchmarks".to_string()));
        }
        if self.experiments.is_empty() {
            return Err(RunnerError::Config(
                "catalog defines no experiment types".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for spec in &self.experiments {
            if !seen.insert(spec.name.as_str()) {
                return Err(RunnerError::Config(format!(
                    "experiment type '{}' defined twice",
                    spec.name
                )));
            }
        }

        for (key, spec) in self.cluster_params.iter().chain(&self.hstore_params) {
            if let Some(default) = &spec.default {
                check_type(key, spec.kind, default)?;
            }
        }

        for (key, value) in self.base_settings.iter().chain(&self.default_options) {
            if let (Some(value), Some(spec)) = (value, self.spec(key)) {
                check_type(key, spec.kind, value)?;
            }
        }

        for key in &self.debug_options {
            if let Some(spec) = self.spec(key) {
                check_type(key, spec.kind, &ParamValue::Bool(true))?;
            }
        }

        Ok(())
    }

    /// Schema entry for `key`, preferring the controller table.
    #[must_use]
    pub fn spec(&self, key: &str) -> Option<&ParamSpec> {
        self.hstore_params
            .get(key)
            .or_else(|| self.cluster_params.get(key))
    }

    #[must_use]
    pub fn experiment_names(&self) -> Vec<String> {
        self.experiments.iter().map(|spec| spec.name.clone()).collect()
    }

    /// The first experiment type listed.
    #[must_use]
    pub fn default_experiment(&self) -> &str {
        self.experiments
            .first()
            .map_or("", |spec| spec.name.as_str())
    }

    /// Cluster parameter defaults with `default_options` applied.
    #[must_use]
    pub fn cluster_defaults(&self) -> Layer {
        let mut layer: Layer = self
            .cluster_params
            .iter()
            .filter_map(|(key, spec)| {
                spec.default
                    .as_ref()
                    .and_then(|value| spec.kind.coerce(value))
                    .map(|value| (key.clone(), Some(value)))
            })
            .collect();
        for (key, value) in &self.default_options {
            layer.insert(key.clone(), value.clone());
        }
        layer
    }

    /// Base settings with the debug and single-client adjustments applied.
    #[must_use]
    pub fn base_layer(&self, single_client: bool, debug_hstore: bool) -> Layer {
        let mut layer: Layer = self
            .base_settings
            .iter()
            .map(|(key, value)| {
                let value = match (value, self.spec(key)) {
                    (Some(value), Some(spec)) => spec.kind.coerce(value),
                    (value, _) => value.clone(),
                };
                (key.clone(), value)
            })
            .collect();

        if debug_hstore {
            for key in &self.debug_options {
                layer.insert(key.clone(), Some(ParamValue::Bool(true)));
            }
        }
        if single_client {
            for key in ["client.count", "client.threads_per_host", "client.txnrate"] {
                layer.insert(key.to_string(), Some(ParamValue::Int(1)));
            }
        }
        layer
    }

    /// Flags to generate, in help order: cluster table first, then the
    /// controller table grouped by prefix.
    #[must_use]
    pub fn cli_params(&self) -> Vec<CliParam> {
        let mut params = Vec::new();

        for (key, spec) in &self.cluster_params {
            let prefix = key.split('.').next().unwrap_or_default();
            if !spec.cli
                || !CLUSTER_PREFIXES.contains(&prefix)
                || self.base_settings.contains_key(key)
                || self.hstore_params.contains_key(key)
            {
                continue;
            }
            let mut spec = spec.clone();
            if let Some(Some(value)) = self.default_options.get(key) {
                spec.default = Some(value.clone());
            }
            params.push(CliParam {
                key: key.clone(),
                spec,
                heading: CLUSTER_HEADING.to_string(),
            });
        }

        for (key, spec) in &self.hstore_params {
            if !spec.cli {
                continue;
            }
            let prefix = key.split('.').next().unwrap_or_default();
            let mut spec = spec.clone();
            if let Some(Some(value)) = self.base_settings.get(key) {
                spec.default = spec.kind.coerce(value);
            }
            params.push(CliParam {
                key: key.clone(),
                spec,
                heading: format!("HStoreConf {} Parameters", title_case(prefix)),
            });
        }

        params
    }
}

fn check_type(key: &str, kind: ParamType, value: &ParamValue) -> Result<()> {
    if kind.coerce(value).is_some() {
        Ok(())
    } else {
        Err(RunnerError::Config(format!(
            "parameter '{key}' is declared {} but has value '{value}'",
            kind.as_str()
        )))
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
