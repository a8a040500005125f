//! Template Loader
//!
//! Loads job and command templates from files or falls back to the embedded
//! defaults.

pub mod embedded;

use std::fmt;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use tracing::debug;

use crate::template::Template;

/// Where a template's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A template file on disk
    File(PathBuf),
    /// An embedded template, by qualified name (e.g. `job/horeka`)
    Embedded(&'static str),
}

impl TemplateSource {
    /// Resolve a user-supplied template reference
    ///
    /// Checks in order:
    /// 1. An existing file at `reference`
    /// 2. An embedded template named `reference`
    pub fn resolve(reference: &str) -> Result<Self> {
        debug!(%reference, "TemplateSource::resolve: called");
        let path = Path::new(reference);
        if path.is_file() {
            debug!(?path, "TemplateSource::resolve: found file");
            return Ok(Self::File(path.to_path_buf()));
        }

        embedded::NAMES
            .iter()
            .copied()
            .find(|name| *name == reference)
            .map(Self::Embedded)
            .ok_or_else(|| {
                eyre!(
                    "Template not found: {} (not a file, embedded templates: {})",
                    reference,
                    embedded::NAMES.join(", ")
                )
            })
    }

    /// Use `reference` when given, the embedded `default` otherwise
    pub fn resolve_or(reference: Option<&str>, default: &'static str) -> Result<Self> {
        match reference {
            Some(reference) => Self::resolve(reference),
            None => Ok(Self::Embedded(default)),
        }
    }

    /// Read the template text
    pub fn load(&self) -> Result<Template> {
        debug!(source = %self, "TemplateSource::load: called");
        match self {
            Self::File(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read template {}", path.display()))?;
                Ok(Template::new(text))
            }
            Self::Embedded(name) => embedded::get_embedded(name)
                .map(Template::new)
                .ok_or_else(|| eyre!("Embedded template not found: {}", name)),
        }
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Embedded(name) => write!(f, "embedded:{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_embedded() {
        let source = TemplateSource::resolve("job/generic").unwrap();
        assert_eq!(source, TemplateSource::Embedded("job/generic"));
        assert!(source.load().unwrap().text().contains("#SBATCH"));
    }

    #[test]
    fn test_resolve_file_wins() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mine.txt");
        std::fs::write(&path, "srun ${cmd}\n").unwrap();

        let source = TemplateSource::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(source, TemplateSource::File(path));
        assert_eq!(source.load().unwrap().text(), "srun ${cmd}\n");
    }

    #[test]
    fn test_resolve_unknown() {
        let err = TemplateSource::resolve("/nonexistent/template.txt").unwrap_err();
        assert!(err.to_string().contains("Template not found"));
    }

    #[test]
    fn test_resolve_or_default() {
        let source = TemplateSource::resolve_or(None, "command/intel").unwrap();
        assert_eq!(source.to_string(), "embedded:command/intel");
    }
}
