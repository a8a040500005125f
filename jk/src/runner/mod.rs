//! Experiment runners
//!
//! A runner expands an [`ExperimentSuite`] into individual runs. The shared
//! memory runner executes them one after another on the local machine; the
//! sbatch runner aggregates them into one job file per input and core count.
//!
//! ```text
//! <experiment_data_dir>/<suite>_<yy_mm_dd>/
//! ├── output/
//! │   ├── config.json
//! │   ├── <job>-log.txt
//! │   └── <job>-error-log.txt
//! └── jobfiles/
//!     └── <suite>-<input>-cores<n>
//! ```

mod sbatch;
mod shared;

pub use sbatch::{SbatchRunner, format_duration};
pub use shared::SharedMemoryRunner;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use eyre::{Context, Result, eyre};
use serde::Serialize;
use serde_yaml::Value;
use tracing::debug;

use crate::command::build_command;
use crate::machine::Machine;
use crate::suite::{ExperimentSuite, Input, RunConfig};
use crate::template::Vars;

/// Account used when `$PROJECT` is not set
pub const PROJECT_NOT_SET: &str = "PROJECT_NOT_SET";

/// Everything a runner needs besides the suite itself
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub machine: Machine,
    pub build_dir: PathBuf,
    pub experiment_data_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub job_output_dir: Option<PathBuf>,
    /// Job template file or embedded name
    pub job_template: Option<String>,
    /// Command template file or embedded name
    pub command_template: Option<String>,
    pub module_config: Option<String>,
    pub module_restore_cmd: String,
    pub tasks_per_node: Option<usize>,
    /// Minutes per run when neither the input nor the suite sets one
    pub time_limit: u64,
    pub test_partition: bool,
    pub omit_json_output_path: bool,
    pub omit_seed: bool,
    /// Shared-memory runs above this core count are skipped
    pub max_cores: usize,
    /// Batch account, usually `$PROJECT`
    pub account: String,
    /// Date suffix of the experiment data directory
    pub date: NaiveDate,
}

impl RunnerOptions {
    pub fn new(machine: Machine) -> Self {
        Self {
            machine,
            build_dir: PathBuf::from("build"),
            experiment_data_dir: PathBuf::from("experiment_data"),
            output_dir: None,
            job_output_dir: None,
            job_template: None,
            command_template: None,
            module_config: None,
            module_restore_cmd: "module restore".to_string(),
            tasks_per_node: None,
            time_limit: crate::DEFAULT_TIME_LIMIT,
            test_partition: false,
            omit_json_output_path: false,
            omit_seed: false,
            max_cores: 1,
            account: PROJECT_NOT_SET.to_string(),
            date: chrono::Local::now().date_naive(),
        }
    }
}

/// Outcome of executing a suite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Runs executed (shared) or job files written (sbatch)
    pub jobs: usize,
    /// Runs that exited non-zero
    pub failed: usize,
    pub output_dir: PathBuf,
    pub job_files: Vec<PathBuf>,
}

/// Executes or prepares every run of a suite
pub trait Runner {
    fn execute(&mut self, suite: &ExperimentSuite) -> Result<Summary>;
}

/// Create the runner for `options.machine`
pub fn get_runner(options: RunnerOptions) -> Box<dyn Runner> {
    debug!(machine = %options.machine, "get_runner: called");
    if options.machine.uses_job_files() {
        Box::new(SbatchRunner::new(options))
    } else {
        Box::new(SharedMemoryRunner::new(options))
    }
}

/// Output directory of one suite execution
pub(crate) fn experiment_dir(options: &RunnerOptions, suite_name: &str) -> PathBuf {
    let suffix = options.date.format("%y_%m_%d");
    options
        .experiment_data_dir
        .join(format!("{}_{}", suite_name, suffix))
}

pub(crate) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Write the exploded configs as 4-space indented JSON
pub(crate) fn write_configs(output_dir: &Path, configs: &[RunConfig]) -> Result<()> {
    let path = output_dir.join("config.json");
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    configs.serialize(&mut ser).context("Failed to serialize configs")?;

    let mut file = fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&buf)?;
    Ok(())
}

/// Input name safe to use inside a file name
pub(crate) fn file_label(input: &Input) -> String {
    input.name().replace('/', "_")
}

/// Command line of one run, with output path and seed added to its config
#[allow(clippy::too_many_arguments)]
pub(crate) fn make_cmd_for_config(
    options: &RunnerOptions,
    suite: &ExperimentSuite,
    output_dir: &Path,
    input: &Input,
    config_job_name: &str,
    mpi_ranks: usize,
    threads_per_rank: usize,
    seed: u64,
    config: &RunConfig,
) -> Result<Vec<String>> {
    let executable = suite
        .executable
        .as_deref()
        .ok_or_else(|| eyre!("Suite {} has no executable", suite.name))?;

    let mut config = config.clone();
    if !options.omit_json_output_path {
        let json_output_path = output_dir.join(format!("{}_timer.json", config_job_name));
        config.insert(
            Value::from("json_output_path"),
            Value::from(json_output_path.display().to_string()),
        );
    }
    if !options.omit_seed {
        config.insert(Value::from("seed"), Value::from(seed));
    }

    build_command(
        &options.build_dir,
        executable,
        Some(input),
        mpi_ranks,
        threads_per_rank,
        true,
        &config,
    )
    .wrap_err_with(|| format!("Failed to build command for {}", config_job_name))
}

/// Variables available to command templates
pub(crate) fn command_vars(
    cmd: &[String],
    jobname: &str,
    mpi_ranks: usize,
    threads_per_rank: usize,
    ranks_per_node: usize,
    time_limit_minutes: u64,
) -> Vars {
    Vars::from([
        ("cmd".to_string(), cmd.join(" ")),
        ("jobname".to_string(), jobname.to_string()),
        ("mpi_ranks".to_string(), mpi_ranks.to_string()),
        ("threads_per_rank".to_string(), threads_per_rank.to_string()),
        ("ranks_per_node".to_string(), ranks_per_node.to_string()),
        ("timeout".to_string(), (time_limit_minutes * 60).to_string()),
    ])
}
