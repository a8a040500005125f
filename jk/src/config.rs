//! Configuration for jobkit

use eyre::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::machine::Machine;

/// Environment variable overriding `build_dir`
pub const BUILD_DIR_ENV: &str = "BUILD_DIR";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Directory holding the experiment binaries
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Root of per-suite experiment data directories
    #[serde(default = "default_experiment_data_dir")]
    pub experiment_data_dir: PathBuf,

    /// Machine used when `--machine` is not given
    #[serde(default)]
    pub machine: Option<Machine>,

    /// Command restoring a module collection, e.g. `module restore`
    #[serde(default = "default_module_restore_cmd")]
    pub module_restore_cmd: String,

    /// Module collection restored at the top of every job file
    #[serde(default)]
    pub module_config: Option<String>,

    /// Default time limit per run in minutes
    #[serde(default = "default_time_limit")]
    pub time_limit: u64,

    /// Core limit for shared-memory runs (defaults to available parallelism)
    #[serde(default)]
    pub max_cores: Option<usize>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_experiment_data_dir() -> PathBuf {
    PathBuf::from("experiment_data")
}

fn default_module_restore_cmd() -> String {
    "module restore".to_string()
}

fn default_time_limit() -> u64 {
    crate::DEFAULT_TIME_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            experiment_data_dir: default_experiment_data_dir(),
            machine: None,
            module_restore_cmd: default_module_restore_cmd(),
            module_config: None,
            time_limit: default_time_limit(),
            max_cores: None,
            log_level: None,
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    ///
    /// Checks in order:
    /// 1. The explicit `path`
    /// 2. Project-local `jobkit.yml`
    /// 3. User config `~/.config/jobkit/jobkit.yml`
    ///
    /// `$BUILD_DIR` overrides `build_dir` in every case.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        if let Some(build_dir) = std::env::var_os(BUILD_DIR_ENV) {
            tracing::debug!(?build_dir, "Config::load: build_dir from environment");
            config.build_dir = PathBuf::from(build_dir);
        }
        Ok(config)
    }

    fn load_file(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let default_paths = [
            Some(PathBuf::from("jobkit.yml")),
            dirs::config_dir().map(|p| p.join("jobkit").join("jobkit.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                match Self::load_from_file(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    pub fn load_log_level(path: Option<&PathBuf>) -> Option<String> {
        Self::load_file(path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Core limit for shared-memory runs
    pub fn max_cores(&self) -> usize {
        self.max_cores
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.module_restore_cmd, "module restore");
        assert_eq!(config.time_limit, crate::DEFAULT_TIME_LIMIT);
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jobkit.yml");
        fs::write(&path, "machine: horeka\ntime_limit: 45\nmodule_config: mpi-gcc\nlog_level: debug\n").unwrap();

        let config = Config::load_file(Some(&path)).unwrap();
        assert_eq!(config.machine, Some(Machine::Horeka));
        assert_eq!(config.time_limit, 45);
        assert_eq!(config.module_config.as_deref(), Some("mpi-gcc"));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let missing = PathBuf::from("/nonexistent/jobkit.yml");
        assert!(Config::load_file(Some(&missing)).is_err());
        assert_eq!(Config::load_log_level(Some(&missing)), None);
    }

    #[test]
    fn test_max_cores() {
        let config = Config {
            max_cores: Some(3),
            ..Default::default()
        };
        assert_eq!(config.max_cores(), 3);
        assert!(Config::default().max_cores() >= 1);
    }
}
