//! Experiment suites
//!
//! A suite is a YAML file describing an experiment grid:
//!
//! ```yaml
//! name: weak-scaling
//! executable: app
//! ncores: [1, 2, 4]
//! threads_per_rank: [1, 2]
//! seeds: [0, 1]
//! time_limit: 10
//! graphs:
//!   - graphs/road.metis
//!   - generator: kagen
//!     type: gnm-undirected
//!     N: [16, 18]
//!     M: 20
//!     time_limit: 30
//! config:
//!   - algorithm: [bfs, dfs]
//!     verbose: true
//! ```

mod error;
mod explode;
mod input;

pub use error::SuiteError;
pub use explode::explode;
pub use input::{DummyInstance, Input, KaGenGraph, slugify};

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

/// One exploded run configuration: flag name to value
pub type RunConfig = Mapping;

/// An experiment grid ready to be expanded into runs
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSuite {
    pub name: String,
    pub executable: Option<String>,
    pub cores: Vec<usize>,
    pub threads_per_rank: Vec<usize>,
    pub inputs: Vec<Input>,
    pub configs: Vec<RunConfig>,
    pub tasks_per_node: Option<usize>,
    /// Minutes per run
    pub time_limit: Option<u64>,
    pub seeds: Vec<u64>,
    /// Minutes per run, by input name
    pub input_time_limit: HashMap<String, u64>,
}

#[derive(Debug, Deserialize)]
struct SuiteFile {
    name: String,
    #[serde(default)]
    executable: Option<String>,
    ncores: Vec<usize>,
    #[serde(default = "default_threads_per_rank")]
    threads_per_rank: Vec<usize>,
    #[serde(default)]
    graphs: Vec<Value>,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    tasks_per_node: Option<usize>,
    #[serde(default)]
    time_limit: Option<u64>,
    #[serde(default = "default_seeds")]
    seeds: Vec<u64>,
}

fn default_threads_per_rank() -> Vec<usize> {
    vec![1]
}

fn default_seeds() -> Vec<u64> {
    vec![0]
}

impl ExperimentSuite {
    /// Parse a suite from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, SuiteError> {
        let file: SuiteFile = serde_yaml::from_str(text)?;
        debug!(name = %file.name, "ExperimentSuite::from_yaml: parsed");

        if let Some(zero) = file.threads_per_rank.iter().find(|t| **t == 0) {
            return Err(SuiteError::InvalidValue {
                key: "threads_per_rank".to_string(),
                message: format!("must be positive, got {}", zero),
            });
        }
        if file.tasks_per_node == Some(0) {
            return Err(SuiteError::InvalidValue {
                key: "tasks_per_node".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let configs = load_configs(file.config)?;
        let mut inputs = Vec::new();
        let mut input_time_limit = HashMap::new();
        for graph in file.graphs {
            for (input, limit) in load_graph(graph)? {
                if let Some(limit) = limit {
                    input_time_limit.insert(input.name(), limit);
                }
                inputs.push(input);
            }
        }

        Ok(Self {
            name: file.name,
            executable: file.executable,
            cores: file.ncores,
            threads_per_rank: file.threads_per_rank,
            inputs,
            configs,
            tasks_per_node: file.tasks_per_node,
            time_limit: file.time_limit,
            seeds: file.seeds,
            input_time_limit,
        })
    }

    pub fn set_input_time_limit(&mut self, input_name: impl Into<String>, minutes: u64) {
        self.input_time_limit.insert(input_name.into(), minutes);
    }

    /// Per-input limit, falling back to the suite-wide limit
    pub fn input_time_limit(&self, input_name: &str) -> Option<u64> {
        self.input_time_limit.get(input_name).copied().or(self.time_limit)
    }
}

/// Load a suite from a YAML file
pub fn load_suite(path: impl AsRef<Path>) -> Result<ExperimentSuite, SuiteError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SuiteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let suite = ExperimentSuite::from_yaml(&text)?;
    info!(
        name = %suite.name,
        inputs = suite.inputs.len(),
        configs = suite.configs.len(),
        "Loaded suite from {}",
        path.display()
    );
    Ok(suite)
}

fn load_configs(config: Value) -> Result<Vec<RunConfig>, SuiteError> {
    match config {
        Value::Null => Ok(vec![Mapping::new()]),
        Value::Mapping(map) => Ok(explode(&map)),
        Value::Sequence(items) => {
            let mut configs = Vec::new();
            for item in items {
                match item {
                    Value::Mapping(map) => configs.extend(explode(&map)),
                    other => return Err(not_a_mapping("config", &other)),
                }
            }
            Ok(configs)
        }
        other => Err(not_a_mapping("config", &other)),
    }
}

/// Inputs described by one `graphs` entry, each with its optional time limit
fn load_graph(graph: Value) -> Result<Vec<(Input, Option<u64>)>, SuiteError> {
    let mut map = match graph {
        Value::Mapping(map) => map,
        Value::Sequence(items) => return Err(not_a_mapping("graphs", &Value::Sequence(items))),
        scalar => return Ok(vec![(Input::Literal(value_to_string(&scalar)), None)]),
    };

    let time_limit = match map.shift_remove("time_limit") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| SuiteError::InvalidValue {
            key: "time_limit".to_string(),
            message: format!("expected minutes, got {}", value_to_string(&value)),
        })?),
    };

    let generator = match map.shift_remove("generator") {
        Some(generator) => value_to_string(&generator),
        None => {
            return Err(SuiteError::NoGenerator {
                graph: serde_yaml::to_string(&map)?.trim_end().to_string(),
            });
        }
    };

    match generator.as_str() {
        "kagen" => explode(&map)
            .into_iter()
            .map(|variant| Ok((Input::KaGen(KaGenGraph::from_mapping(variant)?), time_limit)))
            .collect(),
        "dummy" => Ok(vec![(Input::Dummy(DummyInstance::from_mapping(map)?), time_limit)]),
        _ => Err(SuiteError::UnsupportedGenerator { generator }),
    }
}

fn not_a_mapping(key: &str, value: &Value) -> SuiteError {
    SuiteError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a mapping, got {}", value_to_string(value)),
    }
}

/// Render a YAML value the way it appears on a command line
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => value_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
