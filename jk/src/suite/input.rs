//! Experiment inputs: literal arguments and generated graphs

use deunicode::deunicode;
use serde_yaml::{Mapping, Value};

use super::SuiteError;
use super::value_to_string;

/// One input of an experiment suite
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Passed to the binary verbatim
    Literal(String),
    /// Graph generated in-process by KaGen
    KaGen(KaGenGraph),
    /// Instance described entirely by command-line flags
    Dummy(DummyInstance),
}

impl Input {
    /// Name used in job names and log file names
    pub fn name(&self) -> String {
        match self {
            Self::Literal(arg) => arg.clone(),
            Self::KaGen(graph) => graph.name(),
            Self::Dummy(instance) => instance.name(),
        }
    }

    /// Command-line arguments selecting this input
    pub fn args(&self, mpi_ranks: usize, threads_per_rank: usize, escape: bool) -> Result<Vec<String>, SuiteError> {
        match self {
            Self::Literal(arg) => Ok(vec![arg.clone()]),
            Self::KaGen(graph) => graph.args(mpi_ranks, threads_per_rank, escape),
            Self::Dummy(instance) => Ok(instance.args()),
        }
    }
}

/// KaGen generator parameters
///
/// `n` and `m` are absolute counts; the YAML also accepts `N`/`M` as
/// exponents of two. With `scale_weak` both grow linearly with the number of
/// processing elements.
#[derive(Debug, Clone, PartialEq)]
pub struct KaGenGraph {
    pub n: Option<u64>,
    pub m: Option<u64>,
    pub scale_weak: bool,
    pub params: Mapping,
}

impl KaGenGraph {
    pub fn from_mapping(mut map: Mapping) -> Result<Self, SuiteError> {
        if !map.contains_key("type") {
            return Err(SuiteError::MissingKey {
                generator: "KaGen",
                key: "type",
            });
        }
        let n = take_count(&mut map, "n", "N")?;
        let m = take_count(&mut map, "m", "M")?;
        let scale_weak = match map.shift_remove("scale_weak") {
            None => false,
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(SuiteError::InvalidValue {
                    key: "scale_weak".to_string(),
                    message: format!("expected a boolean, got {}", value_to_string(&other)),
                });
            }
        };
        Ok(Self {
            n,
            m,
            scale_weak,
            params: map,
        })
    }

    pub fn n_for(&self, pes: u64) -> Result<Option<u64>, SuiteError> {
        self.scaled("n", self.n, pes)
    }

    pub fn m_for(&self, pes: u64) -> Result<Option<u64>, SuiteError> {
        self.scaled("m", self.m, pes)
    }

    fn scaled(&self, key: &str, count: Option<u64>, pes: u64) -> Result<Option<u64>, SuiteError> {
        match count {
            Some(count) if self.scale_weak => count
                .checked_mul(pes)
                .map(Some)
                .ok_or_else(|| SuiteError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{} scaled by {} PEs does not fit into 64 bits", count, pes),
                }),
            _ => Ok(count),
        }
    }

    pub fn args(&self, mpi_ranks: usize, threads_per_rank: usize, escape: bool) -> Result<Vec<String>, SuiteError> {
        let pes = mpi_ranks as u64 * threads_per_rank as u64;
        let mut params = param_strings(&self.params);
        if let Some(n) = self.n_for(pes)? {
            params.push(format!("n={}", n));
        }
        if let Some(m) = self.m_for(pes)? {
            params.push(format!("m={}", m));
        }
        let mut options = params.join(";");
        if escape {
            options = format!("\"{}\"", options);
        }
        Ok(vec!["--kagen_option_string".to_string(), options])
    }

    pub fn name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(n) = self.n {
            parts.push(format!("n={}", n.ilog2()));
        }
        if let Some(m) = self.m {
            parts.push(format!("m={}", m.ilog2()));
        }
        parts.extend(param_strings(&self.params));
        if self.scale_weak {
            parts.push("weak".to_string());
        }
        slugify(&format!("KaGen_{}", parts.join("_")))
    }
}

/// Instance whose parameters are passed as `--key "value"` flags
#[derive(Debug, Clone, PartialEq)]
pub struct DummyInstance {
    pub name: String,
    pub params: Mapping,
}

impl DummyInstance {
    /// Key whose value is passed without a preceding flag
    pub const NO_KEY: &'static str = "nokey";

    pub fn from_mapping(mut map: Mapping) -> Result<Self, SuiteError> {
        let name = match map.shift_remove("name") {
            Some(value) => value_to_string(&value),
            None => {
                return Err(SuiteError::MissingKey {
                    generator: "dummy",
                    key: "name",
                });
            }
        };
        Ok(Self { name, params: map })
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.params {
            let key = value_to_string(key);
            if key != Self::NO_KEY {
                args.push(format!("--{}", key));
            }
            if !value.is_bool() {
                args.push(format!("\"{}\"", value_to_string(value)));
            }
        }
        args
    }

    pub fn name(&self) -> String {
        slugify(&format!("{}_{}", self.name, param_strings(&self.params).join("_")))
    }
}

/// `key=value` per parameter, bare `key` for booleans
fn param_strings(params: &Mapping) -> Vec<String> {
    params
        .iter()
        .map(|(key, value)| {
            let key = value_to_string(key);
            if value.is_bool() {
                key
            } else {
                format!("{}={}", key, value_to_string(value))
            }
        })
        .collect()
}

/// Remove an absolute count (`n`) or power-of-two exponent (`N`) from `map`
fn take_count(map: &mut Mapping, absolute: &str, exponent: &str) -> Result<Option<u64>, SuiteError> {
    let abs = map.shift_remove(absolute);
    let exp = map.shift_remove(exponent);
    let count = match (abs, exp) {
        (Some(value), _) => Some(as_u64(absolute, &value)?),
        (None, Some(value)) => {
            let shift = as_u64(exponent, &value)?;
            if shift >= 64 {
                return Err(SuiteError::InvalidValue {
                    key: exponent.to_string(),
                    message: format!("2^{} does not fit into 64 bits", shift),
                });
            }
            Some(1u64 << shift)
        }
        (None, None) => None,
    };
    if count == Some(0) {
        return Err(SuiteError::InvalidValue {
            key: absolute.to_string(),
            message: "must be positive".to_string(),
        });
    }
    Ok(count)
}

fn as_u64(key: &str, value: &Value) -> Result<u64, SuiteError> {
    value.as_u64().ok_or_else(|| SuiteError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a non-negative integer, got {}", value_to_string(value)),
    })
}

/// Lowercase ASCII slug: non-ASCII letters are transliterated, runs of other
/// characters become a single `-`
pub fn slugify(text: &str) -> String {
    let text = deunicode(text);
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("KaGen_n=10_m=12_type=gnm"), "kagen-n-10-m-12-type-gnm");
        assert_eq!(slugify("  Hello, World!  "), "hello-world");
        assert_eq!(slugify("___"), "");
    }

    #[test]
    fn test_slugify_transliterates() {
        assert_eq!(slugify("Café Ñandú"), "cafe-nandu");
        assert_eq!(slugify("Straße_n=10"), "strasse-n-10");
    }

    #[test]
    fn test_kagen_exponents() {
        let graph = KaGenGraph::from_mapping(mapping("type: gnm-undirected\nN: 10\nM: 12")).unwrap();
        assert_eq!(graph.n, Some(1024));
        assert_eq!(graph.m, Some(4096));
        assert_eq!(graph.name(), "kagen-n-10-m-12-type-gnm-undirected");
    }

    #[test]
    fn test_kagen_absolute_count_wins() {
        let graph = KaGenGraph::from_mapping(mapping("type: rgg2d\nn: 1000\nN: 20")).unwrap();
        assert_eq!(graph.n, Some(1000));
        assert!(!graph.params.contains_key("N"));
    }

    #[test]
    fn test_kagen_args_strong_scaling() {
        let graph = KaGenGraph::from_mapping(mapping("type: gnm\nN: 4\nM: 5")).unwrap();
        assert_eq!(
            graph.args(4, 2, false).unwrap(),
            vec!["--kagen_option_string", "type=gnm;n=16;m=32"]
        );
    }

    #[test]
    fn test_kagen_args_weak_scaling_escaped() {
        let graph = KaGenGraph::from_mapping(mapping("type: gnm\nN: 4\nscale_weak: true\ndirected: true")).unwrap();
        assert_eq!(
            graph.args(4, 2, true).unwrap(),
            vec!["--kagen_option_string", "\"type=gnm;directed;n=128\""]
        );
        assert!(graph.name().ends_with("-weak"));
    }

    #[test]
    fn test_kagen_weak_scaling_overflow_is_an_error() {
        let graph = KaGenGraph::from_mapping(mapping("type: gnm\nN: 62\nM: 10\nscale_weak: true")).unwrap();
        let err = graph.args(4, 1, false).unwrap_err();
        assert!(matches!(err, SuiteError::InvalidValue { ref key, .. } if key == "n"));

        assert_eq!(graph.n_for(2).unwrap(), Some(1u64 << 63));
        assert!(graph.m_for(4).is_ok());
    }

    #[test]
    fn test_kagen_strong_scaling_never_overflows() {
        let graph = KaGenGraph::from_mapping(mapping("type: gnm\nN: 63")).unwrap();
        assert_eq!(
            graph.args(1024, 64, false).unwrap(),
            vec!["--kagen_option_string", "type=gnm;n=9223372036854775808"]
        );
    }

    #[test]
    fn test_kagen_requires_type() {
        let err = KaGenGraph::from_mapping(mapping("N: 4")).unwrap_err();
        assert!(matches!(err, SuiteError::MissingKey { key: "type", .. }));
    }

    #[test]
    fn test_kagen_rejects_bad_exponent() {
        assert!(KaGenGraph::from_mapping(mapping("type: gnm\nN: 64")).is_err());
        assert!(KaGenGraph::from_mapping(mapping("type: gnm\nN: ten")).is_err());
    }

    #[test]
    fn test_dummy_args_and_name() {
        let instance = DummyInstance::from_mapping(mapping("name: Foo\nsize: 10\nnokey: input.bin\nverbose: true")).unwrap();
        assert_eq!(
            instance.args(),
            vec!["--size", "\"10\"", "\"input.bin\"", "--verbose"]
        );
        assert_eq!(instance.name(), "foo-size-10-nokey-input-bin-verbose");
    }

    #[test]
    fn test_dummy_requires_name() {
        assert!(DummyInstance::from_mapping(mapping("size: 1")).is_err());
    }

    #[test]
    fn test_literal_input() {
        let input = Input::Literal("graphs/road.metis".to_string());
        assert_eq!(input.name(), "graphs/road.metis");
        assert_eq!(input.args(8, 1, true).unwrap(), vec!["graphs/road.metis"]);
    }
}
