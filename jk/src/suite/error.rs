//! Suite error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading an experiment suite
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Failed to read suite {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid suite YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No generator defined for graph: {graph}")]
    NoGenerator { graph: String },

    #[error("'{generator}' is an unsupported graph generator, use one of [kagen, dummy]")]
    UnsupportedGenerator { generator: String },

    #[error("{generator} graph requires '{key}'")]
    MissingKey { generator: &'static str, key: &'static str },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
