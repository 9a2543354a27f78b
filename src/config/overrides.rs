//! Metadata override rules.
//!
//! Overrides may be written in three shapes:
//!
//! ```yaml
//! # Mapping of pattern -> values
//! metadata_overrides:
//!   "section1/*.ipynb":
//!     order: 1
//!
//! # List of pattern/values objects (`file`/`match` and `merge` are aliases)
//! metadata_overrides:
//!   - pattern: "intro.md"
//!     values:
//!       title: Welcome
//!
//! # List of inline objects (every non-pattern key is a value)
//! metadata_overrides:
//!   - match: "*.ipynb"
//!     install: [pandas]
//! ```
//!
//! All three normalize to the same ordered list of [`MetadataOverrideRule`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const PATTERN_KEYS: [&str; 3] = ["pattern", "file", "match"];
const VALUE_KEYS: [&str; 2] = ["values", "merge"];

/// A glob pattern and the metadata patch applied to files it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataOverrideRule {
    pub pattern: String,
    pub values: Map<String, Value>,
}

/// Normalize any accepted override shape into canonical rules.
///
/// Entries that cannot be interpreted (non-mapping values, list items
/// without a pattern) are dropped.
pub fn normalize_overrides(raw: &Value) -> Vec<MetadataOverrideRule> {
    match raw {
        Value::Object(map) => map
            .iter()
            .filter_map(|(pattern, values)| {
                values.as_object().map(|values| MetadataOverrideRule {
                    pattern: pattern.clone(),
                    values: values.clone(),
                })
            })
            .collect(),
        Value::Array(items) => items.iter().filter_map(rule_from_list_item).collect(),
        _ => Vec::new(),
    }
}

fn rule_from_list_item(item: &Value) -> Option<MetadataOverrideRule> {
    let obj = item.as_object()?;

    let pattern = PATTERN_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(non_empty_str)?
        .to_string();

    let explicit = VALUE_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| is_truthy(v));

    let values = match explicit {
        Some(Value::Object(values)) => values.clone(),
        Some(_) => return None,
        None => obj
            .iter()
            .filter(|(k, _)| !PATTERN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };

    Some(MetadataOverrideRule { pattern, values })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
