//! Configuration environment and layered merge.
//!
//! Sources and precedence (highest wins):
//! 1. CLI overrides (only flags the user actually passed)
//! 2. Experiment-type settings (`--exp-type`)
//! 3. Built-in base settings
//! 4. Cluster parameter defaults
//!
//! A layer may map a key to `null`. That removes the key from the merged
//! environment and records it in the removal set, so the remote
//! configuration drops it too.

mod catalog;

pub use catalog::{CATALOG_ENV_VAR, Catalog, CliParam, ExperimentSpec, ParamSpec};

use crate::error::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Flat, fully merged parameter mapping.
pub type Env = BTreeMap<String, ParamValue>;

/// One configuration layer. `None` marks a key for removal.
pub type Layer = BTreeMap<String, Option<ParamValue>>;

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// The declared type this value naturally belongs to.
    #[must_use]
    pub const fn kind(&self) -> ParamType {
        match self {
            Self::Bool(_) => ParamType::Bool,
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::Str(_) => ParamType::String,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of ints and floats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            // Debug keeps the trailing ".0" on whole numbers
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Int,
    Float,
    Bool,
    String,
}

impl ParamType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }

    /// Fit `value` to this type. Ints widen to floats; nothing else converts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(&self, value: &ParamValue) -> Option<ParamValue> {
        match (self, value) {
            (Self::Float, ParamValue::Int(v)) => Some(ParamValue::Float(*v as f64)),
            (kind, value) if value.kind() == *kind => Some(value.clone()),
            _ => None,
        }
    }

    /// Parse a command-line string as this type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the text does not parse.
    pub fn parse_value(&self, key: &str, raw: &str) -> Result<ParamValue> {
        let raw = raw.trim();
        let invalid = || {
            RunnerError::invalid_parameter(key, format!("expected {}, got '{raw}'", self.as_str()))
        };
        match self {
            Self::Int => raw.parse().map(ParamValue::Int).map_err(|_| invalid()),
            Self::Float => raw.parse().map(ParamValue::Float).map_err(|_| invalid()),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(ParamValue::Bool(false)),
                _ => Err(invalid()),
            },
            Self::String => Ok(ParamValue::Str(raw.to_string())),
        }
    }
}

impl FromStr for ParamType {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Int),
            "float" | "double" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            "string" | "str" => Ok(Self::String),
            other => Err(RunnerError::Config(format!("unknown parameter type '{other}'"))),
        }
    }
}

/// Result of the layered merge: the environment plus keys to strip remotely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig {
    pub env: Env,
    pub removals: BTreeSet<String>,
}

impl MergedConfig {
    /// Removal set minus every key the given environment still defines.
    #[must_use]
    pub fn removals_for(&self, env: &Env) -> BTreeSet<String> {
        self.removals
            .iter()
            .filter(|key| !env.contains_key(*key))
            .cloned()
            .collect()
    }
}

fn apply_layer(merged: &mut MergedConfig, layer: &Layer) {
    for (key, value) in layer {
        match value {
            Some(value) => {
                merged.env.insert(key.clone(), value.clone());
                merged.removals.remove(key);
            }
            None => {
                debug!(key = %key, "Parameter to remove");
                merged.env.remove(key);
                merged.removals.insert(key.clone());
            }
        }
    }
}

/// Merge `defaults` (in order), the selected experiment layer, then
/// `overrides`.
///
/// Keys that only non-selected experiment types define, and that the merged
/// environment lacks, land in the removal set so a previous experiment's
/// settings cannot leak into this run.
///
/// # Errors
///
/// Returns `UnknownExperiment` if `exp_type` is not one of `experiments`.
pub fn merge(
    defaults: &[&Layer],
    experiments: &[ExperimentSpec],
    exp_type: &str,
    overrides: &Layer,
) -> Result<MergedConfig> {
    let selected = experiments
        .iter()
        .find(|spec| spec.name == exp_type)
        .ok_or_else(|| RunnerError::UnknownExperiment {
            name: exp_type.to_string(),
            known: experiments.iter().map(|spec| spec.name.clone()).collect(),
        })?;

    let mut merged = MergedConfig::default();
    for layer in defaults {
        apply_layer(&mut merged, layer);
    }
    apply_layer(&mut merged, &selected.settings);
    apply_layer(&mut merged, overrides);

    for other in experiments.iter().filter(|spec| spec.name != exp_type) {
        for key in other.settings.keys() {
            if !merged.env.contains_key(key) {
                merged.removals.insert(key.clone());
            }
        }
    }

    debug!(removals = ?merged.removals, "Configuration parameters to remove");
    Ok(merged)
}

/// Add or drop the ` compile` target on `hstore.exec_prefix`.
pub fn set_compile_target(env: &mut Env, compile: bool) {
    let prefix = env
        .get("hstore.exec_prefix")
        .and_then(ParamValue::as_str)
        .unwrap_or_default()
        .to_string();
    let updated = if compile {
        if prefix.contains("compile") {
            prefix
        } else {
            format!("{prefix} compile")
        }
    } else {
        prefix.replace("compile", "")
    };
    env.insert("hstore.exec_prefix".to_string(), ParamValue::Str(updated));
}

/// Append a raw token to `hstore.exec_prefix`.
pub fn append_exec_prefix(env: &mut Env, token: &str) {
    let prefix = env
        .get("hstore.exec_prefix")
        .and_then(ParamValue::as_str)
        .unwrap_or_default();
    let updated = format!("{prefix} {token}");
    env.insert("hstore.exec_prefix".to_string(), ParamValue::Str(updated));
}
