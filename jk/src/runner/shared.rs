//! Local execution on a shared-memory machine

use std::fs::File;
use std::process::{Command, Stdio};

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use super::{
    Runner, RunnerOptions, Summary, command_vars, create_dir, experiment_dir, file_label, make_cmd_for_config,
    write_configs,
};
use crate::suite::ExperimentSuite;
use crate::templates::TemplateSource;

/// Runs every configuration directly through `sh -c`
pub struct SharedMemoryRunner {
    options: RunnerOptions,
}

impl SharedMemoryRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }
}

impl Runner for SharedMemoryRunner {
    fn execute(&mut self, suite: &ExperimentSuite) -> Result<Summary> {
        let options = &self.options;
        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| experiment_dir(options, &suite.name).join("output"));
        create_dir(&output_dir)?;
        write_configs(&output_dir, &suite.configs)?;

        let source = TemplateSource::resolve_or(
            options.command_template.as_deref(),
            options.machine.default_command_template(),
        )?;
        let command_template = source.load()?;
        info!("Running suite {} ...", suite.name);

        let mut summary = Summary {
            output_dir: output_dir.clone(),
            ..Default::default()
        };

        for input in &suite.inputs {
            let input_name = file_label(input);
            let time_limit = suite.input_time_limit(&input.name()).unwrap_or(options.time_limit);
            for (i, config) in suite.configs.iter().enumerate() {
                for &ncores in &suite.cores {
                    if ncores > options.max_cores {
                        debug!(ncores, max_cores = options.max_cores, "SharedMemoryRunner: skipping core count");
                        continue;
                    }
                    for &seed in &suite.seeds {
                        for &threads in &suite.threads_per_rank {
                            let mpi_ranks = ncores / threads;
                            if mpi_ranks == 0 {
                                debug!(ncores, threads, "SharedMemoryRunner: fewer cores than threads, skipping");
                                continue;
                            }
                            let jobname = format!("{}-np{}-t{}-c{}-s{}", input_name, mpi_ranks, threads, i, seed);
                            let cmd = make_cmd_for_config(
                                options,
                                suite,
                                &output_dir,
                                input,
                                &jobname,
                                mpi_ranks,
                                threads,
                                seed,
                                config,
                            )?;
                            let vars = command_vars(&cmd, &jobname, mpi_ranks, threads, mpi_ranks, time_limit);
                            let cmd_string = command_template
                                .render(&vars)
                                .wrap_err_with(|| format!("Failed to render command template {}", source))?;

                            info!(
                                "Running config {} on {} using {} ranks and {} threads per rank",
                                i,
                                input.name(),
                                mpi_ranks,
                                threads
                            );
                            debug!(%cmd_string, "SharedMemoryRunner: command");

                            let log_path = output_dir.join(format!("{}-log.txt", jobname));
                            let err_path = output_dir.join(format!("{}-error-log.txt", jobname));
                            let log_file = File::create(&log_path)
                                .with_context(|| format!("Failed to create {}", log_path.display()))?;
                            let err_file = File::create(&err_path)
                                .with_context(|| format!("Failed to create {}", err_path.display()))?;
                            let status = Command::new("sh")
                                .arg("-c")
                                .arg(&cmd_string)
                                .stdin(Stdio::null())
                                .stdout(log_file)
                                .stderr(err_file)
                                .status()
                                .with_context(|| format!("Failed to spawn shell for {}", jobname))?;

                            summary.jobs += 1;
                            if status.success() {
                                info!(%jobname, "finished");
                            } else {
                                summary.failed += 1;
                                warn!(%jobname, ?status, "failed");
                            }
                        }
                    }
                }
            }
        }

        info!(
            "Finished suite {}: {} out of {} failed, output files in {}",
            suite.name,
            summary.failed,
            summary.jobs,
            output_dir.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;
    use std::fs;
    use tempfile::TempDir;

    fn options(temp: &TempDir, template: &str) -> RunnerOptions {
        let template_path = temp.path().join("command.txt");
        fs::write(&template_path, template).unwrap();

        let mut options = RunnerOptions::new(Machine::Shared);
        options.experiment_data_dir = temp.path().join("data");
        options.output_dir = Some(temp.path().join("out"));
        options.command_template = Some(template_path.display().to_string());
        options.max_cores = 4;
        options
    }

    #[test]
    fn test_runs_every_combination_within_core_limit() {
        let temp = TempDir::new().unwrap();
        let suite = ExperimentSuite::from_yaml(
            "name: s\nexecutable: app\nncores: [1, 2, 8]\nseeds: [0, 1]\ngraphs: [g]\nconfig:\n  mode: [a, b]",
        )
        .unwrap();

        let mut runner = SharedMemoryRunner::new(options(&temp, "echo ${cmd} np=${mpi_ranks}"));
        let summary = runner.execute(&suite).unwrap();

        // 2 configs x 2 core counts (8 > max) x 2 seeds
        assert_eq!(summary.jobs, 8);
        assert_eq!(summary.failed, 0);

        let log = fs::read_to_string(temp.path().join("out/g-np2-t1-c1-s0-log.txt")).unwrap();
        assert!(log.starts_with("build/app g --mode b --json_output_path"));
        assert!(log.contains("--seed 0 np=2"));
        assert!(temp.path().join("out/config.json").exists());
    }

    #[test]
    fn test_counts_failures() {
        let temp = TempDir::new().unwrap();
        let suite = ExperimentSuite::from_yaml("name: s\nexecutable: app\nncores: [1]\ngraphs: [g]").unwrap();

        let mut runner = SharedMemoryRunner::new(options(&temp, "echo oops >&2; exit 3"));
        let summary = runner.execute(&suite).unwrap();

        assert_eq!(summary.jobs, 1);
        assert_eq!(summary.failed, 1);
        let err = fs::read_to_string(temp.path().join("out/g-np1-t1-c0-s0-error-log.txt")).unwrap();
        assert_eq!(err.trim(), "oops");
    }

    #[test]
    fn test_missing_template_variable_aborts() {
        let temp = TempDir::new().unwrap();
        let suite = ExperimentSuite::from_yaml("name: s\nexecutable: app\nncores: [1]\ngraphs: [g]").unwrap();

        let mut runner = SharedMemoryRunner::new(options(&temp, "${launcher} ${cmd}"));
        let err = runner.execute(&suite).unwrap_err();
        assert!(format!("{:?}", err).contains("launcher"));
    }
}
