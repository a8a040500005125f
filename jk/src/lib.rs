//! jobkit - job script templating for MPI experiments on HPC clusters
//!
//! Renders batch-job headers and MPI launch wrappers from `${name}` templates,
//! and expands experiment suites into the runs that fill them.
//!
//! # Example
//!
//! ```
//! use jobkit::template::{Template, Vars};
//!
//! let template = Template::new("#SBATCH --nodes=${nodes}\n${commands}\n");
//! let vars = Vars::from([
//!     ("nodes".to_string(), "4".to_string()),
//!     ("commands".to_string(), "srun ./app".to_string()),
//! ]);
//! assert_eq!(template.render(&vars)?, "#SBATCH --nodes=4\nsrun ./app\n");
//! # Ok::<(), jobkit::template::TemplateError>(())
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod machine;
pub mod runner;
pub mod suite;
pub mod template;
pub mod templates;

pub use machine::Machine;
pub use runner::{Runner, RunnerOptions, Summary, get_runner};
pub use suite::{ExperimentSuite, load_suite};
pub use template::{Template, TemplateError, Vars, render};

/// Default time limit per run in minutes
pub const DEFAULT_TIME_LIMIT: u64 = 10;
