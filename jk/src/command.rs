//! Command-line construction for a single run

use std::path::Path;

use serde_yaml::Value;
use tracing::debug;

use crate::suite::{Input, RunConfig, SuiteError, value_to_string};

/// Turn a run configuration into command-line flags
///
/// Single-character keys become `-k`, longer keys `--key`. `true` and `null`
/// produce the bare flag, `false` drops it, anything else is followed by its
/// value.
pub fn params_to_flags(config: &RunConfig) -> Vec<String> {
    let mut flags = Vec::new();
    for (key, value) in config {
        let key = value_to_string(key);
        let dash = if key.chars().count() > 1 { "--" } else { "-" };
        match value {
            Value::Bool(false) => {}
            Value::Bool(true) | Value::Null => flags.push(format!("{}{}", dash, key)),
            other => {
                flags.push(format!("{}{}", dash, key));
                flags.push(value_to_string(other));
            }
        }
    }
    flags
}

/// Build the argv of one run: binary, input arguments, config flags
pub fn build_command(
    build_dir: &Path,
    binary: &str,
    input: Option<&Input>,
    mpi_ranks: usize,
    threads_per_rank: usize,
    escape: bool,
    config: &RunConfig,
) -> Result<Vec<String>, SuiteError> {
    debug!(%binary, mpi_ranks, threads_per_rank, "build_command: called");
    let mut command = vec![build_dir.join(binary).display().to_string()];
    if let Some(input) = input {
        command.extend(input.args(mpi_ranks, threads_per_rank, escape)?);
    }
    command.extend(params_to_flags(config));
    Ok(command)
}
