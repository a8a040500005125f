//! Cartesian expansion of list-valued config keys

use serde_yaml::{Mapping, Value};

/// Expand every list-valued key into one config per element
///
/// The first list-valued key (in key order) is expanded and each variant is
/// exploded again, so the result is the cartesian product with earlier keys
/// varying slowest. Key order is kept. An empty list removes its key.
pub fn explode(config: &Mapping) -> Vec<Mapping> {
    for (key, value) in config {
        if let Value::Sequence(values) = value {
            if values.is_empty() {
                let mut pruned = config.clone();
                pruned.shift_remove(key);
                return explode(&pruned);
            }
            return values
                .iter()
                .flat_map(|v| {
                    let mut variant = config.clone();
                    variant.insert(key.clone(), v.clone());
                    explode(&variant)
                })
                .collect();
        }
    }
    vec![config.clone()]
}
