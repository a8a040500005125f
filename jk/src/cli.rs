//! CLI argument parsing for jobkit

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::machine::Machine;

#[derive(Parser, Debug)]
#[command(name = "jk")]
#[command(author, version, about = "Job script templating for MPI experiments on HPC clusters", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a template with the given variables
    Render {
        /// Template file or embedded template name (see `jk templates`)
        #[arg(required = true)]
        template: String,

        /// Variable assignment, repeatable
        #[arg(short = 'v', long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// YAML mapping of variables; --var takes precedence
        #[arg(long)]
        vars_file: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run experiment suites or write their job files
    Run(RunArgs),

    /// List embedded templates, or print one
    Templates {
        /// Embedded template to print
        name: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Suite YAML files
    #[arg(required = true)]
    pub suites: Vec<PathBuf>,

    /// Target machine (default from config, else shared)
    #[arg(short, long, value_enum)]
    pub machine: Option<Machine>,

    /// Core limit for shared-memory runs
    #[arg(long)]
    pub max_cores: Option<usize>,

    /// Root of per-suite experiment data directories
    #[arg(long)]
    pub experiment_data_dir: Option<PathBuf>,

    /// Directory for logs and config.json
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for generated job files
    #[arg(long)]
    pub job_output_dir: Option<PathBuf>,

    /// Job template file or embedded name
    #[arg(long)]
    pub sbatch_template: Option<String>,

    /// Command template file or embedded name
    #[arg(long)]
    pub command_template: Option<String>,

    /// Module collection restored in every job file
    #[arg(long)]
    pub module_config: Option<String>,

    /// Command used to restore the module collection
    #[arg(long)]
    pub module_restore_cmd: Option<String>,

    /// Tasks per node (suite setting takes precedence)
    #[arg(long)]
    pub tasks_per_node: Option<usize>,

    /// Time limit per run in minutes
    #[arg(short, long)]
    pub time_limit: Option<u64>,

    /// Use the test partition where available
    #[arg(long)]
    pub test: bool,

    /// Do not pass --json_output_path to the binary
    #[arg(long)]
    pub omit_json_output_path: bool,

    /// Do not pass --seed to the binary
    #[arg(long)]
    pub omit_seed: bool,
}

/// Parse `KEY=VALUE`; the value may itself contain `=`
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var("nodes=4").unwrap(), ("nodes".to_string(), "4".to_string()));
        assert_eq!(parse_var("cmd=a=b").unwrap(), ("cmd".to_string(), "a=b".to_string()));
        assert_eq!(parse_var("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from(["jk", "render", "job/generic", "-v", "nodes=2", "--var", "ntasks=8"]).unwrap();
        match cli.command {
            Command::Render { template, vars, .. } => {
                assert_eq!(template, "job/generic");
                assert_eq!(vars.len(), 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["jk", "run", "a.yml", "b.yml", "-m", "generic-job-file", "--test", "-t", "30"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.suites.len(), 2);
                assert_eq!(args.machine, Some(Machine::Generic));
                assert!(args.test);
                assert_eq!(args.time_limit, Some(30));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_suite() {
        assert!(Cli::try_parse_from(["jk", "run"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
