//! Data archives.
//!
//! Glob patterns are resolved against a base directory with shell semantics:
//! `*` stays within one path component and `**` spans directories. Neither
//! matches a hidden name (one starting with `.`); only a pattern component
//! that itself starts with `.` does. Matching files are stored uncompressed
//! under their base-relative path.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::paths::normalize;

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("failed to write archive {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to add {entry} to archive: {source}")]
    Zip {
        entry: String,
        source: zip::result::ZipError,
    },
}

/// What went into an archive.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    /// Number of files archived
    pub files: usize,
    /// Patterns that matched nothing
    pub unmatched: Vec<String>,
}

/// Build `zip_path` from the files under `base_dir` matching `patterns`.
///
/// Overlapping patterns contribute each source file once.
pub fn create_data_zip(
    patterns: &[String],
    zip_path: &Path,
    base_dir: &Path,
) -> Result<ArchiveReport, ArchiveError> {
    let io_err = |source| ArchiveError::Io {
        path: zip_path.to_path_buf(),
        source,
    };

    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(zip_path).map_err(io_err)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut report = ArchiveReport::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for pattern in patterns {
        let matches = resolve_pattern(pattern, base_dir);
        if matches.is_empty() {
            tracing::warn!(
                "no files match pattern '{}' in {}",
                pattern,
                base_dir.display()
            );
            report.unmatched.push(pattern.clone());
            continue;
        }

        for path in matches {
            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !seen.insert(canonical) {
                continue;
            }

            let entry = archive_name(&path, base_dir);
            writer
                .start_file(entry.as_str(), options)
                .map_err(|source| ArchiveError::Zip {
                    entry: entry.clone(),
                    source,
                })?;
            let mut input = File::open(&path).map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;
            std::io::copy(&mut input, &mut writer).map_err(io_err)?;
            report.files += 1;
        }
    }

    writer.finish().map_err(|source| ArchiveError::Zip {
        entry: zip_path.display().to_string(),
        source,
    })?;

    tracing::info!(
        "created {} with {} file(s)",
        zip_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        report.files
    );
    Ok(report)
}

/// Expand one glob pattern into the sorted list of matching files.
fn resolve_pattern(pattern: &str, base_dir: &Path) -> Vec<PathBuf> {
    let pattern = pattern.replace('\\', "/");
    let (prefix, rest) = split_literal_prefix(&pattern);
    let root = base_dir.join(&prefix);

    let Some(rest) = rest else {
        // No glob characters: a plain file reference
        return if root.is_file() { vec![root] } else { Vec::new() };
    };

    let matcher = match compile(&rest) {
        Ok(matcher) => matcher,
        Err(e) => {
            tracing::warn!("ignoring invalid data file pattern '{}': {}", pattern, e);
            return Vec::new();
        }
    };
    // Pattern components allowed to match hidden names
    let hidden: Vec<GlobMatcher> = rest
        .split('/')
        .filter(|part| part.starts_with('.'))
        .filter_map(|part| compile(part).ok())
        .collect();

    WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .strip_prefix(&root)
                .map(|rel| matcher.is_match(rel) && hidden_allowed(rel, &hidden))
                .unwrap_or(false)
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn compile(glob: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(glob)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Every hidden component of `rel` must be named by a dot pattern component.
fn hidden_allowed(rel: &Path, hidden: &[GlobMatcher]) -> bool {
    rel.components().all(|c| match c {
        Component::Normal(name) if name.to_string_lossy().starts_with('.') => {
            hidden.iter().any(|m| m.is_match(name))
        }
        _ => true,
    })
}

/// Split a pattern into its leading glob-free directories and the remainder.
/// Returns `None` for the remainder when the pattern has no glob characters.
fn split_literal_prefix(pattern: &str) -> (PathBuf, Option<String>) {
    let parts: Vec<&str> = pattern.split('/').collect();
    match parts.iter().position(|p| has_glob_chars(p)) {
        None => (PathBuf::from(pattern), None),
        Some(idx) => {
            let mut prefix = if pattern.starts_with('/') {
                PathBuf::from("/")
            } else {
                PathBuf::new()
            };
            prefix.extend(parts[..idx].iter().filter(|p| !p.is_empty()));
            (prefix, Some(parts[idx..].join("/")))
        }
    }
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Archive entry name: base-relative, normalized, and never escaping the
/// extraction directory.
fn archive_name(path: &Path, base_dir: &Path) -> String {
    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    let rel = normalize(rel);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn entries(zip_path: &Path) -> Vec<String> {
        let file = File::open(zip_path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_star_stays_in_one_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/a.csv", "a");
        touch(dir.path(), "data/nested/b.csv", "b");
        let zip_path = dir.path().join("out/test-data.zip");

        let report = create_data_zip(&["data/*.csv".to_string()], &zip_path, dir.path()).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(entries(&zip_path), vec!["data/a.csv"]);
    }

    #[test]
    fn test_double_star_recurses() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/a.csv", "a");
        touch(dir.path(), "data/nested/b.csv", "b");
        let zip_path = dir.path().join("out.zip");

        let report =
            create_data_zip(&["data/**/*.csv".to_string()], &zip_path, dir.path()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(entries(&zip_path), vec!["data/a.csv", "data/nested/b.csv"]);
    }

    #[test]
    fn test_overlapping_patterns_deduplicate() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/a.csv", "a");
        touch(dir.path(), "data/b.txt", "b");
        let zip_path = dir.path().join("out.zip");

        let patterns = vec![
            "data/*".to_string(),
            "data/*.csv".to_string(),
            "./data/a.csv".to_string(),
        ];
        let report = create_data_zip(&patterns, &zip_path, dir.path()).unwrap();

        assert_eq!(report.files, 2);
        assert!(report.unmatched.is_empty());
        assert_eq!(entries(&zip_path), vec!["data/a.csv", "data/b.txt"]);
    }

    #[test]
    fn test_zero_match_pattern_is_reported() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/a.csv", "a");
        let zip_path = dir.path().join("out.zip");

        let patterns = vec!["missing/*.json".to_string(), "data/a.csv".to_string()];
        let report = create_data_zip(&patterns, &zip_path, dir.path()).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(report.unmatched, vec!["missing/*.json"]);
        assert!(zip_path.exists());
    }

    #[test]
    fn test_entries_are_stored_with_content() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt", "hello");
        let zip_path = dir.path().join("out.zip");

        create_data_zip(&["*.txt".to_string()], &zip_path, dir.path()).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut entry = archive.by_name("notes.txt").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_split_literal_prefix() {
        assert_eq!(
            split_literal_prefix("data/raw/*.csv"),
            (PathBuf::from("data/raw"), Some("*.csv".to_string()))
        );
        assert_eq!(
            split_literal_prefix("**/*.csv"),
            (PathBuf::new(), Some("**/*.csv".to_string()))
        );
        assert_eq!(split_literal_prefix("a/b.csv"), (PathBuf::from("a/b.csv"), None));
        assert_eq!(
            split_literal_prefix("/srv/data/*.csv"),
            (PathBuf::from("/srv/data"), Some("*.csv".to_string()))
        );
    }

    #[test]
    fn test_globs_skip_hidden_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/a.csv", "a");
        touch(dir.path(), "data/.DS_Store", "junk");
        touch(dir.path(), "data/.ipynb_checkpoints/a-checkpoint.csv", "old");
        let zip_path = dir.path().join("out.zip");

        let report = create_data_zip(&["data/**/*".to_string()], &zip_path, dir.path()).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(entries(&zip_path), vec!["data/a.csv"]);
    }

    #[test]
    fn test_dot_pattern_matches_hidden_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/.env", "x");
        touch(dir.path(), "data/.cache/b.json", "b");
        touch(dir.path(), "data/c.json", "c");
        let zip_path = dir.path().join("out.zip");

        let patterns = vec!["data/.*".to_string(), "data/.cache/*.json".to_string()];
        let report = create_data_zip(&patterns, &zip_path, dir.path()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(entries(&zip_path), vec!["data/.cache/b.json", "data/.env"]);
    }

    #[test]
    fn test_absolute_pattern_keeps_its_root() {
        let data = TempDir::new().unwrap();
        touch(data.path(), "shared/x.csv", "x");
        let base = TempDir::new().unwrap();
        let zip_path = base.path().join("out.zip");

        let pattern = format!("{}/shared/*.csv", data.path().display());
        let report = create_data_zip(&[pattern], &zip_path, base.path()).unwrap();

        assert_eq!(report.files, 1);
        assert!(report.unmatched.is_empty());
    }

    #[test]
    fn test_archive_name_does_not_escape() {
        assert_eq!(
            archive_name(Path::new("/nb/../shared/x.csv"), Path::new("/nb")),
            "shared/x.csv"
        );
        assert_eq!(archive_name(Path::new("/nb/./d/x.csv"), Path::new("/nb")), "d/x.csv");
    }
}
