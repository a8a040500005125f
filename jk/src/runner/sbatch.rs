//! Job file generation for SLURM clusters

use std::fs;
use std::path::PathBuf;

use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use super::{
    Runner, RunnerOptions, Summary, command_vars, create_dir, experiment_dir, file_label, make_cmd_for_config,
    write_configs,
};
use crate::machine::required_nodes;
use crate::suite::ExperimentSuite;
use crate::template::Vars;
use crate::templates::TemplateSource;

/// Writes one sbatch job file per input and core count
pub struct SbatchRunner {
    options: RunnerOptions,
}

impl SbatchRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    fn module_setup(&self) -> String {
        match &self.options.module_config {
            Some(module_config) => format!("{} {}", self.options.module_restore_cmd, module_config),
            None => "# no specific module setup given".to_string(),
        }
    }
}

impl Runner for SbatchRunner {
    fn execute(&mut self, suite: &ExperimentSuite) -> Result<Summary> {
        let options = &self.options;
        let machine = options.machine;
        let data_dir = experiment_dir(options, &suite.name);
        let output_dir = options.output_dir.clone().unwrap_or_else(|| data_dir.join("output"));
        let job_dir = options.job_output_dir.clone().unwrap_or_else(|| data_dir.join("jobfiles"));
        create_dir(&output_dir)?;
        create_dir(&job_dir)?;
        write_configs(&output_dir, &suite.configs)?;

        let job_source = match (&options.job_template, machine.default_job_template()) {
            (Some(reference), _) => TemplateSource::resolve(reference)?,
            (None, Some(default)) => TemplateSource::Embedded(default),
            (None, None) => return Err(eyre!("No default job template for {}, please provide one", machine)),
        };
        let job_template = job_source.load()?;
        let command_source =
            TemplateSource::resolve_or(options.command_template.as_deref(), machine.default_command_template())?;
        let command_template = command_source.load()?;
        debug!(job = %job_source, command = %command_source, "SbatchRunner: templates loaded");

        let tasks_per_node = suite
            .tasks_per_node
            .or(options.tasks_per_node)
            .unwrap_or_else(|| machine.default_tasks_per_node());
        let module_setup = self.module_setup();

        let mut summary = Summary {
            output_dir: output_dir.clone(),
            ..Default::default()
        };

        for input in &suite.inputs {
            let input_name = file_label(input);
            let job_time_limit = suite.input_time_limit(&input.name()).unwrap_or(options.time_limit);

            for &ncores in &suite.cores {
                let aggregate_jobname = format!("{}-{}-cores{}", suite.name, input_name, ncores);
                let nodes = required_nodes(ncores, tasks_per_node);
                let queue = machine
                    .queue(ncores, tasks_per_node, options.test_partition)
                    .wrap_err_with(|| format!("No partition for job {}", aggregate_jobname))?;

                let mut total_minutes = 0;
                let mut commands = Vec::new();
                for &threads in &suite.threads_per_rank {
                    let mpi_ranks = ncores / threads;
                    if mpi_ranks == 0 {
                        debug!(ncores, threads, "SbatchRunner: fewer cores than threads, skipping");
                        continue;
                    }
                    let ranks_per_node = (tasks_per_node / threads).max(1);
                    let jobname = format!("{}-np{}-t{}", input_name, mpi_ranks, threads);
                    for (i, config) in suite.configs.iter().enumerate() {
                        for &seed in &suite.seeds {
                            total_minutes += job_time_limit;
                            let config_jobname = format!("{}-c{}-s{}", jobname, i, seed);
                            let cmd = make_cmd_for_config(
                                options,
                                suite,
                                &output_dir,
                                input,
                                &config_jobname,
                                mpi_ranks,
                                threads,
                                seed,
                                config,
                            )?;
                            let vars =
                                command_vars(&cmd, &config_jobname, mpi_ranks, threads, ranks_per_node, job_time_limit);
                            commands.push(
                                command_template
                                    .render(&vars)
                                    .wrap_err_with(|| format!("Failed to render command template {}", command_source))?,
                            );
                        }
                    }
                }

                let log_path = output_dir.join(format!("{}-cores{}-log.txt", input_name, ncores));
                let err_log_path = output_dir.join(format!("{}-cores{}-error-log.txt", input_name, ncores));
                let vars = Vars::from([
                    ("nodes".to_string(), nodes.to_string()),
                    ("ntasks".to_string(), ncores.to_string()),
                    ("ntasks_per_node".to_string(), tasks_per_node.to_string()),
                    ("output_log".to_string(), log_path.display().to_string()),
                    ("error_output_log".to_string(), err_log_path.display().to_string()),
                    ("job_name".to_string(), aggregate_jobname.clone()),
                    ("job_queue".to_string(), queue),
                    ("islands".to_string(), machine.islands(nodes).to_string()),
                    ("account".to_string(), options.account.clone()),
                    ("module_setup".to_string(), module_setup.clone()),
                    ("commands".to_string(), commands.join("\n")),
                    ("time_string".to_string(), format_duration(total_minutes * 60)),
                ]);
                let job_script = job_template
                    .render(&vars)
                    .wrap_err_with(|| format!("Failed to render job template {}", job_source))?;

                let job_file: PathBuf = job_dir.join(&aggregate_jobname);
                fs::write(&job_file, job_script).with_context(|| format!("Failed to write {}", job_file.display()))?;
                debug!(?job_file, nodes, "SbatchRunner: job file written");
                summary.jobs += 1;
                summary.job_files.push(job_file);
            }
        }

        info!("Created {} job files in directory {}", summary.jobs, job_dir.display());
        Ok(summary)
    }
}

/// SLURM time string `D-HH:MM:SS`
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let seconds = seconds % 60;
    format!("{}-{:02}:{:02}:{:02}", days, hours, minutes, seconds)
}
