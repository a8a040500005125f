//! Cluster policies: partitions, islands and template defaults

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised by machine policies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("Cannot use more than {max} compute nodes on {machine} (requested {nodes})")]
    TooManyNodes { machine: Machine, nodes: usize, max: usize },

    #[error("{machine} runs locally and has no batch partition")]
    NoPartition { machine: Machine },
}

/// Target machine of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Machine {
    /// Local shared-memory machine, runs are executed directly
    Shared,
    /// SuperMUC-NG (LRZ)
    #[value(name = "supermuc")]
    #[serde(rename = "supermuc")]
    SuperMuc,
    /// HoreKa (KIT)
    Horeka,
    /// Any SLURM cluster, single generic partition
    #[value(name = "generic-job-file")]
    #[serde(rename = "generic-job-file")]
    Generic,
}

impl Machine {
    /// Whether runs are aggregated into sbatch job files
    pub fn uses_job_files(&self) -> bool {
        !matches!(self, Self::Shared)
    }

    pub fn default_tasks_per_node(&self) -> usize {
        match self {
            Self::Shared | Self::Generic => 1,
            Self::SuperMuc => 48,
            Self::Horeka => 76,
        }
    }

    /// Embedded job template used when none is given
    pub fn default_job_template(&self) -> Option<&'static str> {
        match self {
            Self::Shared => None,
            Self::SuperMuc => Some("job/supermuc"),
            Self::Horeka => Some("job/horeka"),
            Self::Generic => Some("job/generic"),
        }
    }

    /// Embedded command template used when none is given
    pub fn default_command_template(&self) -> &'static str {
        match self {
            Self::Shared => "command/shared",
            Self::SuperMuc => "command/intel",
            Self::Horeka | Self::Generic => "command/generic",
        }
    }

    /// Partition for a job on `cores` cores
    pub fn queue(&self, cores: usize, tasks_per_node: usize, test_partition: bool) -> Result<String, MachineError> {
        let nodes = required_nodes(cores, tasks_per_node);
        debug!(machine = %self, cores, nodes, test_partition, "Machine::queue: called");
        let queue = match self {
            Self::Shared => return Err(MachineError::NoPartition { machine: *self }),
            Self::SuperMuc => match nodes {
                0..=16 if test_partition => "test",
                0..=16 => "micro",
                17..=768 => "general",
                _ => "large",
            },
            Self::Horeka => match nodes {
                0..=12 if test_partition => "dev_cpuonly",
                0..=192 => "cpuonly",
                _ => {
                    return Err(MachineError::TooManyNodes {
                        machine: *self,
                        nodes,
                        max: 192,
                    });
                }
            },
            Self::Generic => "generic_partition",
        };
        Ok(queue.to_string())
    }

    /// Number of islands (network switches) a job on `nodes` nodes spans
    pub fn islands(&self, nodes: usize) -> usize {
        match self {
            Self::SuperMuc if nodes > 768 => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shared => "shared",
            Self::SuperMuc => "supermuc",
            Self::Horeka => "horeka",
            Self::Generic => "generic-job-file",
        };
        write!(f, "{}", name)
    }
}

/// Nodes needed for `cores` tasks, at least one
pub fn required_nodes(cores: usize, tasks_per_node: usize) -> usize {
    cores.div_ceil(tasks_per_node.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_nodes() {
        assert_eq!(required_nodes(0, 48), 1);
        assert_eq!(required_nodes(48, 48), 1);
        assert_eq!(required_nodes(49, 48), 2);
        assert_eq!(required_nodes(768, 76), 11);
    }

    #[test]
    fn test_supermuc_queue() {
        let m = Machine::SuperMuc;
        assert_eq!(m.queue(48 * 16, 48, false).unwrap(), "micro");
        assert_eq!(m.queue(48 * 16, 48, true).unwrap(), "test");
        assert_eq!(m.queue(48 * 17, 48, true).unwrap(), "general");
        assert_eq!(m.queue(48 * 768, 48, false).unwrap(), "general");
        assert_eq!(m.queue(48 * 769, 48, false).unwrap(), "large");
    }

    #[test]
    fn test_supermuc_islands() {
        assert_eq!(Machine::SuperMuc.islands(768), 1);
        assert_eq!(Machine::SuperMuc.islands(769), 2);
        assert_eq!(Machine::Horeka.islands(10_000), 1);
    }

    #[test]
    fn test_horeka_queue() {
        let m = Machine::Horeka;
        assert_eq!(m.queue(76 * 12, 76, true).unwrap(), "dev_cpuonly");
        assert_eq!(m.queue(76 * 12, 76, false).unwrap(), "cpuonly");
        assert_eq!(m.queue(76 * 13, 76, true).unwrap(), "cpuonly");
        assert_eq!(
            m.queue(76 * 193, 76, false).unwrap_err(),
            MachineError::TooManyNodes {
                machine: Machine::Horeka,
                nodes: 193,
                max: 192
            }
        );
    }

    #[test]
    fn test_generic_and_shared_queue() {
        assert_eq!(Machine::Generic.queue(1000, 1, true).unwrap(), "generic_partition");
        assert!(Machine::Shared.queue(1, 1, false).is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Machine::SuperMuc.default_tasks_per_node(), 48);
        assert_eq!(Machine::Horeka.default_tasks_per_node(), 76);
        assert_eq!(Machine::Generic.default_tasks_per_node(), 1);
        assert_eq!(Machine::Shared.default_job_template(), None);
        assert!(!Machine::Shared.uses_job_files());
        assert_eq!(Machine::Generic.to_string(), "generic-job-file");
    }

    #[test]
    fn test_value_enum_names() {
        assert_eq!(Machine::from_str("supermuc", false).unwrap(), Machine::SuperMuc);
        assert_eq!(Machine::from_str("generic-job-file", false).unwrap(), Machine::Generic);
        assert!(Machine::from_str("lumi", false).is_err());
    }
}
