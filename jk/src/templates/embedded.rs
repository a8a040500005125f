//! Embedded templates
//!
//! These are compiled into the binary from the files under `templates/`.

use tracing::debug;

/// SuperMUC-NG sbatch header
pub const JOB_SUPERMUC: &str = include_str!("../../templates/job/supermuc.txt");

/// HoreKa sbatch header
pub const JOB_HOREKA: &str = include_str!("../../templates/job/horeka.txt");

/// Cluster-agnostic sbatch header
pub const JOB_GENERIC: &str = include_str!("../../templates/job/generic.txt");

/// Local `mpiexec` launch
pub const COMMAND_SHARED: &str = include_str!("../../templates/command/shared.txt");

/// Intel MPI launch with timing and timeout
pub const COMMAND_INTEL: &str = include_str!("../../templates/command/intel.txt");

/// `srun` launch with timing and timeout
pub const COMMAND_GENERIC: &str = include_str!("../../templates/command/generic.txt");

/// Names of all embedded templates, `<kind>/<name>`
pub const NAMES: &[&str] = &[
    "job/supermuc",
    "job/horeka",
    "job/generic",
    "command/shared",
    "command/intel",
    "command/generic",
];

/// Get the embedded template by qualified name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "job/supermuc" => Some(JOB_SUPERMUC),
        "job/horeka" => Some(JOB_HOREKA),
        "job/generic" => Some(JOB_GENERIC),
        "command/shared" => Some(COMMAND_SHARED),
        "command/intel" => Some(COMMAND_INTEL),
        "command/generic" => Some(COMMAND_GENERIC),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
