//! Copying of locally referenced assets (images, PDFs, videos) next to the
//! pages and notebooks that reference them.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::paths::is_remote;

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("failed to copy asset {path}: {source}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
}

static NOTEBOOK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"(?i)\[.*?\]\(([^)]+\.(?:pdf|png|jpg|jpeg|gif|svg))\)"#,
        r#"(?i)<img.*?src=["']([^"']+\.(?:png|jpg|jpeg|gif|svg))["']"#,
        r#"(?i)!\[.*?\]\(([^)]+\.(?:png|jpg|jpeg|gif|svg))\)"#,
    ])
});

static MARKDOWN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"(?i)\[.*?\]\(([^)]+\.(?:pdf|png|jpg|jpeg|gif|svg|mp4|webm|mov))\)"#,
        r#"(?i)<img.*?src=["']([^"']+\.(?:png|jpg|jpeg|gif|svg))["']"#,
        r#"(?i)!\[.*?\]\(([^)]+\.(?:png|jpg|jpeg|gif|svg))\)"#,
        r#"(?i)<source.*?src=["']([^"']+\.(?:mp4|webm|mov))["']"#,
        r#"(?i)<video.*?src=["']([^"']+\.(?:mp4|webm|mov))["']"#,
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid asset reference regex"))
        .collect()
}

/// Which reference syntax to recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSyntax {
    /// Images and PDFs in notebook markdown cells
    Notebook,
    /// Images, PDFs and videos in markdown pages
    Markdown,
}

impl AssetSyntax {
    fn patterns(self) -> &'static [Regex] {
        match self {
            AssetSyntax::Notebook => &NOTEBOOK_PATTERNS,
            AssetSyntax::Markdown => &MARKDOWN_PATTERNS,
        }
    }
}

/// Local references found in `content`, in pattern order. Remote URLs are
/// left out.
pub fn find_references(content: &str, syntax: AssetSyntax) -> Vec<String> {
    syntax
        .patterns()
        .iter()
        .flat_map(|re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|r| !is_remote(r))
        .collect()
}

/// Copy every local reference in `content` from `source_dir` into
/// `output_dir`, keeping its relative path. Existing destinations are left
/// alone and missing sources are reported.
///
/// Returns the references that were copied.
pub fn copy_referenced_files(
    content: &str,
    syntax: AssetSyntax,
    source_dir: &Path,
    output_dir: &Path,
) -> Result<Vec<String>, AssetError> {
    let mut copied = Vec::new();

    for reference in find_references(content, syntax) {
        let source = source_dir.join(&reference);
        if !source.is_file() {
            tracing::warn!("referenced file not found: {}", reference);
            continue;
        }

        let dest = output_dir.join(&reference);
        if dest.exists() {
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AssetError::Copy {
                path: dest.clone(),
                source,
            })?;
        }
        std::fs::copy(&source, &dest).map_err(|e| AssetError::Copy {
            path: source.clone(),
            source: e,
        })?;
        tracing::info!("copied referenced file: {}", reference);
        copied.push(reference);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_every_reference_pattern_compiles() {
        assert_eq!(NOTEBOOK_PATTERNS.len(), 3);
        assert_eq!(MARKDOWN_PATTERNS.len(), 5);
    }

    #[test]
    fn test_find_notebook_references() {
        let content = r#"See [the handout](docs/handout.pdf) and ![chart](img/Chart.PNG).
<img src="figures/plot.svg" width="400">
Remote ![x](https://example.com/x.png) is ignored."#;
        let refs = find_references(content, AssetSyntax::Notebook);
        assert!(refs.contains(&"docs/handout.pdf".to_string()));
        assert!(refs.contains(&"img/Chart.PNG".to_string()));
        assert!(refs.contains(&"figures/plot.svg".to_string()));
        assert!(!refs.iter().any(|r| r.starts_with("http")));
    }

    #[test]
    fn test_videos_only_in_markdown_syntax() {
        let content = r#"[demo](clips/demo.mp4)
<video controls src="clips/intro.webm"></video>
<source src='clips/outro.mov' type="video/quicktime">"#;
        assert!(find_references(content, AssetSyntax::Notebook).is_empty());

        let refs = find_references(content, AssetSyntax::Markdown);
        assert_eq!(
            refs,
            vec!["clips/demo.mp4", "clips/outro.mov", "clips/intro.webm"]
        );
    }

    #[test]
    fn test_copy_preserves_relative_path_and_skips_missing() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("img")).unwrap();
        std::fs::write(src.path().join("img/a.png"), b"png").unwrap();

        let content = "![a](img/a.png) ![b](img/missing.png)";
        let copied =
            copy_referenced_files(content, AssetSyntax::Markdown, src.path(), out.path()).unwrap();

        assert_eq!(copied, vec!["img/a.png"]);
        assert!(out.path().join("img/a.png").exists());
        assert!(!out.path().join("img/missing.png").exists());
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(src.path().join("a.png"), b"new").unwrap();
        std::fs::write(out.path().join("a.png"), b"old").unwrap();

        let copied =
            copy_referenced_files("![a](a.png)", AssetSyntax::Notebook, src.path(), out.path())
                .unwrap();

        assert!(copied.is_empty());
        assert_eq!(std::fs::read(out.path().join("a.png")).unwrap(), b"old");
    }
}
