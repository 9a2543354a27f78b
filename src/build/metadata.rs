//! Per-file metadata: override merging and the typed view used by processors.

use std::path::Path;

use globset::GlobBuilder;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::config::{Link, MetadataOverrideRule, package_list, string_or_list};

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("invalid workshop metadata in {path}: {source}")]
    Invalid {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}

/// Recursively merge `patch` into `base`.
///
/// Nested mappings merge key by key; sequences and scalars in `patch`
/// replace whatever `base` held.
pub fn deep_merge(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Whether a rule's glob matches the file's root-relative path or bare name.
///
/// Matching follows shell fnmatch semantics, so `*` may cross `/`.
pub fn rule_matches(pattern: &str, relative_path: &str, file_name: &str) -> bool {
    match GlobBuilder::new(pattern).literal_separator(false).build() {
        Ok(glob) => {
            let matcher = glob.compile_matcher();
            matcher.is_match(relative_path) || matcher.is_match(file_name)
        }
        Err(e) => {
            tracing::warn!("ignoring invalid override pattern '{}': {}", pattern, e);
            false
        }
    }
}

/// Apply every matching override rule, in declaration order, to `meta`.
///
/// `relative_path` is the file path relative to the project root.
pub fn apply_overrides(
    relative_path: &str,
    meta: &Map<String, Value>,
    rules: &[MetadataOverrideRule],
) -> Map<String, Value> {
    let file_name = Path::new(relative_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut merged = meta.clone();
    for rule in rules {
        if rule_matches(&rule.pattern, relative_path, &file_name) {
            tracing::debug!(pattern = %rule.pattern, file = %relative_path, "applying metadata override");
            deep_merge(&mut merged, &rule.values);
        }
    }
    merged
}

// =============================================================================
// Typed metadata
// =============================================================================

/// Typed view over a merged metadata mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Explicit ordering key within the section
    pub order: Option<f64>,
    pub slides: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub data_files: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// `None` when absent, so the config default can apply
    #[serde(default, deserialize_with = "optional_package_list")]
    pub install: Option<Vec<String>>,
}

impl ItemMetadata {
    pub fn from_map(map: &Map<String, Value>, path: &Path) -> Result<Self, MetadataError> {
        serde_json::from_value(Value::Object(map.clone())).map_err(|source| {
            MetadataError::Invalid {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn has_data_files(&self) -> bool {
        !self.data_files.is_empty()
    }

    /// Whether notebook setup cells are called for.
    pub fn needs_setup(&self) -> bool {
        self.has_data_files() || self.install.as_ref().is_some_and(|p| !p.is_empty())
    }
}

fn optional_package_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    package_list(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    fn rule(pattern: &str, values: Value) -> MetadataOverrideRule {
        MetadataOverrideRule {
            pattern: pattern.to_string(),
            values: map(values),
        }
    }

    #[test]
    fn test_deep_merge_nested_and_replace() {
        let mut base = map(json!({
            "title": "Base",
            "nested": {"a": 1, "b": {"x": 1}},
            "data_files": ["a.csv"]
        }));
        let patch = map(json!({
            "nested": {"b": {"y": 2}, "c": 3},
            "data_files": ["b.csv"]
        }));
        deep_merge(&mut base, &patch);
        assert_eq!(
            Value::Object(base),
            json!({
                "title": "Base",
                "nested": {"a": 1, "b": {"x": 1, "y": 2}, "c": 3},
                "data_files": ["b.csv"]
            })
        );
    }

    #[test]
    fn test_mapping_replaces_scalar() {
        let mut base = map(json!({"slides": "a.pdf"}));
        deep_merge(&mut base, &map(json!({"slides": {"file": "b.pdf"}})));
        assert_eq!(base["slides"], json!({"file": "b.pdf"}));
    }

    #[test]
    fn test_glob_matches_relative_path_only_in_section() {
        assert!(rule_matches("section1/*.ipynb", "section1/intro.ipynb", "intro.ipynb"));
        assert!(!rule_matches("section1/*.ipynb", "section2/intro.ipynb", "intro.ipynb"));
    }

    #[test]
    fn test_glob_matches_bare_name() {
        assert!(rule_matches("intro.ipynb", "section2/intro.ipynb", "intro.ipynb"));
        assert!(rule_matches("intro.?pynb", "a/b/intro.ipynb", "intro.ipynb"));
        assert!(rule_matches("[ij]ntro.md", "intro.md", "intro.md"));
        assert!(!rule_matches("*.md", "section1/intro.ipynb", "intro.ipynb"));
    }

    #[test]
    fn test_star_crosses_directories() {
        assert!(rule_matches("*.ipynb", "a/b/c.ipynb", "c.ipynb"));
        assert!(rule_matches("a*c.ipynb", "a/b/c.ipynb", "c.ipynb"));
    }

    #[test]
    fn test_no_match_returns_original() {
        let meta = map(json!({"title": "Keep"}));
        let rules = vec![rule("other/*.md", json!({"title": "Changed"}))];
        assert_eq!(apply_overrides("section1/a.md", &meta, &rules), meta);
    }

    #[test]
    fn test_later_rules_take_precedence() {
        let rules = vec![
            rule("*.ipynb", json!({"title": "First", "order": 1})),
            rule("section1/*", json!({"title": "Second"})),
        ];
        let merged = apply_overrides("section1/a.ipynb", &Map::new(), &rules);
        assert_eq!(merged["title"], "Second");
        assert_eq!(merged["order"], 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = map(json!({"title": "T", "nested": {"a": [1, 2]}}));
        let rules = vec![
            rule("*.ipynb", json!({"nested": {"b": 2}, "order": 3})),
            rule("s/*", json!({"nested": {"a": [9]}})),
        ];
        let once = apply_overrides("s/x.ipynb", &base, &rules);
        let twice = apply_overrides("s/x.ipynb", &once, &rules);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sequential_rules_equal_merged_patch() {
        let base = map(json!({"title": "T", "nested": {"a": 1, "keep": true}}));
        let a = json!({"nested": {"a": 2, "b": {"x": 1}}, "links": [{"name": "A"}]});
        let b = json!({"nested": {"b": {"y": 2}}, "links": [{"name": "B"}]});

        let sequential = apply_overrides(
            "s/x.ipynb",
            &base,
            &[rule("*.ipynb", a.clone()), rule("s/*", b.clone())],
        );

        let mut combined = map(a);
        deep_merge(&mut combined, &map(b));
        let single = apply_overrides(
            "s/x.ipynb",
            &base,
            &[MetadataOverrideRule {
                pattern: "*.ipynb".to_string(),
                values: combined,
            }],
        );

        assert_eq!(sequential, single);
    }

    #[test]
    fn test_item_metadata_view() {
        let meta = map(json!({
            "title": "Intro",
            "order": 2,
            "data_files": "data/*.csv",
            "install": "pandas  tqdm",
            "links": [{"name": "Docs", "url": "https://x"}]
        }));
        let item = ItemMetadata::from_map(&meta, Path::new("a.ipynb")).unwrap();
        assert_eq!(item.title.as_deref(), Some("Intro"));
        assert_eq!(item.order, Some(2.0));
        assert_eq!(item.data_files, vec!["data/*.csv"]);
        assert_eq!(item.install, Some(vec!["pandas".to_string(), "tqdm".to_string()]));
        assert_eq!(item.links[0].description, "");
        assert!(item.needs_setup());
    }

    #[test]
    fn test_item_metadata_absent_install() {
        let item = ItemMetadata::from_map(&map(json!({"title": "x"})), Path::new("a.md")).unwrap();
        assert_eq!(item.install, None);
        assert!(!item.needs_setup());
    }
}
