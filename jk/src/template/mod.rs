//! Template Renderer
//!
//! Substitutes shell-style placeholders in fixed text:
//!
//! - `${name}` braced placeholder
//! - `$name` bare placeholder (`[_A-Za-z][_A-Za-z0-9]*`)
//! - `$$` literal dollar sign
//!
//! Any other `$` is rejected. A placeholder without a value fails the whole
//! render; there is no partial output.

mod error;

pub use error::TemplateError;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

/// Variable name to substitution value
pub type Vars = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))",
    )
    .expect("placeholder pattern is valid")
});

/// A template string with `${name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Raw template text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.text) {
            if let Some(name) = placeholder_name(&caps)
                && !names.iter().any(|n| n == name)
            {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Substitute every placeholder with its value from `vars`
    pub fn render(&self, vars: &Vars) -> Result<String, TemplateError> {
        debug!(len = self.text.len(), vars = vars.len(), "Template::render: called");
        let mut out = String::with_capacity(self.text.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&self.text[last..whole.start()]);
            last = whole.end();

            if caps.name("escaped").is_some() {
                out.push('$');
                continue;
            }

            match placeholder_name(&caps) {
                Some(name) => match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        debug!(%name, "Template::render: missing variable");
                        return Err(TemplateError::MissingVariable { name: name.to_string() });
                    }
                },
                None => {
                    let (line, column) = line_and_column(&self.text, whole.start());
                    return Err(TemplateError::InvalidPlaceholder { line, column });
                }
            }
        }

        out.push_str(&self.text[last..]);
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Render `text` with `vars` in one step
pub fn render(text: &str, vars: &Vars) -> Result<String, TemplateError> {
    Template::new(text).render(vars)
}

fn placeholder_name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.name("named").or_else(|| caps.name("braced")).map(|m| m.as_str())
}

/// 1-based line and column of a byte offset
fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vars(pairs: &[(&str, &str)]) -> Vars {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_render_braced_and_bare() {
        let t = Template::new("#SBATCH --nodes=${nodes}\nsrun -n $ntasks ./app");
        let out = t.render(&vars(&[("nodes", "4"), ("ntasks", "192")])).unwrap();
        assert_eq!(out, "#SBATCH --nodes=4\nsrun -n 192 ./app");
    }

    #[test]
    fn test_render_every_occurrence() {
        let out = render("${x}-${x}-$x", &vars(&[("x", "ab")])).unwrap();
        assert_eq!(out, "ab-ab-ab");
    }

    #[test]
    fn test_bare_placeholder_stops_at_non_identifier() {
        let out = render("$name.txt ${name}_log", &vars(&[("name", "job")])).unwrap();
        assert_eq!(out, "job.txt job_log");
    }

    #[test]
    fn test_escaped_dollar() {
        let out = render("echo $$SLURM_JOB_ID ${id}", &vars(&[("id", "7")])).unwrap();
        assert_eq!(out, "echo $SLURM_JOB_ID 7");
    }

    #[test]
    fn test_missing_variable_fails() {
        let err = render("--time=${time_string}", &Vars::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingVariable {
                name: "time_string".to_string()
            }
        );
    }

    #[test]
    fn test_first_missing_variable_reported() {
        let err = render("${a} ${b}", &vars(&[("b", "1")])).unwrap_err();
        assert_eq!(err.missing_name(), Some("a"));
    }

    #[test]
    fn test_invalid_placeholder_position() {
        let err = render("ok\n  cost: $5", &Vars::new()).unwrap_err();
        assert_eq!(err, TemplateError::InvalidPlaceholder { line: 2, column: 9 });
    }

    #[test]
    fn test_unterminated_brace_is_invalid() {
        let err = render("${open", &vars(&[("open", "x")])).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidPlaceholder { line: 1, column: 1 }));
    }

    #[test]
    fn test_trailing_dollar_is_invalid() {
        assert!(render("cost$", &Vars::new()).is_err());
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let out = render("${cmd}", &vars(&[("cmd", "echo ${HOME} $x")])).unwrap();
        assert_eq!(out, "echo ${HOME} $x");
    }

    #[test]
    fn test_unused_variables_are_ignored() {
        let out = render("plain text", &vars(&[("unused", "1")])).unwrap();
        assert_eq!(out, "plain text");
    }

    #[test]
    fn test_placeholders_in_first_appearance_order() {
        let t = Template::new("${b} $a ${b} $$c ${c}");
        assert_eq!(t.placeholders(), vec!["b", "a", "c"]);
    }

    proptest! {
        #[test]
        fn prop_render_is_deterministic(
            value in "[ -~]{0,20}",
            prefix in "[a-z ]{0,10}",
        ) {
            let t = Template::new(format!("{prefix}${{v}}{prefix}$v"));
            let vs = vars(&[("v", value.as_str())]);
            prop_assert_eq!(t.render(&vs).unwrap(), t.render(&vs).unwrap());
        }

        #[test]
        fn prop_value_substituted_verbatim(
            value in "[ -~]{0,20}",
            count in 1usize..5,
        ) {
            let text = "[${v}]".repeat(count);
            let out = render(&text, &vars(&[("v", value.as_str())])).unwrap();
            prop_assert_eq!(out, format!("[{value}]").repeat(count));
        }

        #[test]
        fn prop_missing_variable_never_renders(name in "[_a-z][_a-z0-9]{0,8}") {
            let text = format!("before ${{{name}}} after");
            let err = render(&text, &Vars::new()).unwrap_err();
            prop_assert_eq!(err.missing_name(), Some(name.as_str()));
        }
    }
}
