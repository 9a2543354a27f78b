//! Markdown source documents: front matter, heading anchors and the
//! generated table of contents.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n(.*)\z").expect("Invalid front matter regex")
});

static SECOND_LEVEL_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## (.+?)\r?$").expect("Invalid heading regex"));

static NON_ANCHOR_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("Invalid anchor regex"));

/// Title of the TOC entry pointing at the generated links list.
pub const USEFUL_LINKS: &str = "Useful Links";

/// Result of splitting front matter from markdown content.
#[derive(Debug, Default)]
pub struct ParsedContent {
    /// The parsed front matter (empty if none found)
    pub front_matter: Map<String, Value>,
    /// The markdown content without the front matter block
    pub content: String,
}

/// Parse front matter from markdown content.
///
/// Front matter is a YAML block delimited by `---` at the start of the file:
///
/// ```markdown
/// ---
/// title: My Page
/// order: 2
/// ---
///
/// Content starts here
/// ```
///
/// Malformed YAML is reported and the whole input is kept as content.
pub fn parse_front_matter(content: &str) -> ParsedContent {
    let whole = || ParsedContent {
        front_matter: Map::new(),
        content: content.to_string(),
    };

    let Some(caps) = FRONT_MATTER.captures(content) else {
        return whole();
    };
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str()).to_string();
    if yaml.trim().is_empty() {
        return ParsedContent {
            front_matter: Map::new(),
            content: body,
        };
    }

    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Object(front_matter)) => ParsedContent {
            front_matter,
            content: body,
        },
        Ok(Value::Null) => ParsedContent {
            front_matter: Map::new(),
            content: body,
        },
        Ok(_) => {
            tracing::warn!("front matter is not a mapping, ignoring it");
            whole()
        }
        Err(e) => {
            tracing::warn!("invalid YAML front matter: {}", e);
            whole()
        }
    }
}

/// Anchor for a heading: lowercased, punctuation stripped, spaces to hyphens.
///
/// "Next Steps!" -> "next-steps"
pub fn slugify(heading: &str) -> String {
    NON_ANCHOR_CHARS
        .replace_all(heading, "")
        .trim()
        .to_lowercase()
        .replace(' ', "-")
}

/// Second-level headings in `content`, in document order.
pub fn second_level_headings(content: &str) -> Vec<String> {
    SECOND_LEVEL_HEADING
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Markdown table of contents built from the second-level headings.
///
/// Returns an empty string when there is nothing to list.
pub fn toc_markdown(content: &str, has_useful_links: bool) -> String {
    let mut headings = second_level_headings(content);
    if has_useful_links {
        headings.insert(0, USEFUL_LINKS.to_string());
    }
    if headings.is_empty() {
        return String::new();
    }

    let mut lines = vec!["## Table of Contents\n".to_string()];
    lines.extend(
        headings
            .iter()
            .map(|h| format!("- [{}](#{})", h, slugify(h))),
    );
    lines.join("\n") + "\n"
}
