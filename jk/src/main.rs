//! jobkit - job script templating for MPI experiments
//!
//! CLI entry point for rendering templates and running experiment suites.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use jobkit::cli::{Cli, Command, RunArgs};
use jobkit::config::Config;
use jobkit::runner::PROJECT_NOT_SET;
use jobkit::suite::value_to_string;
use jobkit::templates::{TemplateSource, embedded};
use jobkit::{Machine, RunnerOptions, Vars, get_runner, load_suite};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Render {
            template,
            vars,
            vars_file,
            output,
        } => cmd_render(&template, vars, vars_file, output),
        Command::Run(args) => cmd_run(&config, args),
        Command::Templates { name } => cmd_templates(name.as_deref()),
    }
}

fn cmd_render(
    reference: &str,
    cli_vars: Vec<(String, String)>,
    vars_file: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let source = TemplateSource::resolve(reference)?;
    let template = source.load()?;

    let mut vars = Vars::new();
    if let Some(path) = vars_file {
        let content = fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        let mapping: serde_yaml::Mapping =
            serde_yaml::from_str(&content).context(format!("Failed to parse {}", path.display()))?;
        for (key, value) in &mapping {
            let name = value_to_string(key);
            if value.is_null() {
                return Err(eyre!("Variable {} in {} has no value", name, path.display()));
            }
            vars.insert(name, value_to_string(value));
        }
    }
    vars.extend(cli_vars);

    let rendered = template
        .render(&vars)
        .context(format!("Failed to render template {}", source))?;

    match output {
        Some(path) => {
            fs::write(&path, rendered).context(format!("Failed to write {}", path.display()))?;
            eprintln!("{} Rendered {} to {}", "✓".green(), source, path.display().to_string().cyan());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn cmd_run(config: &Config, args: RunArgs) -> Result<()> {
    let machine = args.machine.or(config.machine).unwrap_or(Machine::Shared);
    let options = RunnerOptions {
        machine,
        build_dir: config.build_dir.clone(),
        experiment_data_dir: args
            .experiment_data_dir
            .unwrap_or_else(|| config.experiment_data_dir.clone()),
        output_dir: args.output_dir,
        job_output_dir: args.job_output_dir,
        job_template: args.sbatch_template,
        command_template: args.command_template,
        module_config: args.module_config.or_else(|| config.module_config.clone()),
        module_restore_cmd: args
            .module_restore_cmd
            .unwrap_or_else(|| config.module_restore_cmd.clone()),
        tasks_per_node: args.tasks_per_node,
        time_limit: args.time_limit.unwrap_or(config.time_limit),
        test_partition: args.test,
        omit_json_output_path: args.omit_json_output_path,
        omit_seed: args.omit_seed,
        max_cores: args.max_cores.unwrap_or_else(|| config.max_cores()),
        account: std::env::var("PROJECT").unwrap_or_else(|_| PROJECT_NOT_SET.to_string()),
        date: chrono::Local::now().date_naive(),
    };
    info!(%machine, suites = args.suites.len(), "jobkit run starting");

    let mut runner = get_runner(options);
    for path in &args.suites {
        let suite = load_suite(path).context(format!("Failed to load suite {}", path.display()))?;
        let summary = runner.execute(&suite)?;

        if machine.uses_job_files() {
            println!(
                "{} Created {} job files for suite {}",
                "✓".green(),
                summary.jobs,
                suite.name.cyan()
            );
            for job_file in &summary.job_files {
                println!("  {}", job_file.display());
            }
        } else if summary.failed == 0 {
            println!(
                "{} Suite {}: {} runs finished, output in {}",
                "✓".green(),
                suite.name.cyan(),
                summary.jobs,
                summary.output_dir.display()
            );
        } else {
            println!(
                "{} Suite {}: {} out of {} runs failed, output in {}",
                "✗".red(),
                suite.name.cyan(),
                summary.failed,
                summary.jobs,
                summary.output_dir.display()
            );
        }
    }
    Ok(())
}

fn cmd_templates(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let text = embedded::get_embedded(name).ok_or_else(|| {
                eyre!(
                    "Embedded template not found: {} (available: {})",
                    name,
                    embedded::NAMES.join(", ")
                )
            })?;
            print!("{}", text);
        }
        None => {
            for name in embedded::NAMES {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
