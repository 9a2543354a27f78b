use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

use super::threshold_bytes;
use crate::build::PublishContext;
use crate::git::{GitRepo, run_git};

/// Root-level source artifacts worth checking alongside the output tree.
const ROOT_ARTIFACTS: &[&str] = &["pptx", "pdf", "zip"];

/// Register oversized outputs with Git LFS in the project repository.
///
/// Nothing here is fatal: outside a repository the step is silent, and a
/// missing LFS extension or a failed `track` only warns. Returns the paths
/// that were newly tracked.
pub fn track_large_files(ctx: &PublishContext) -> Vec<String> {
    if GitRepo::discover(&ctx.root).is_none() {
        return Vec::new();
    }
    tracing::info!("git repository detected, checking for large files");

    let gitattributes = std::fs::read_to_string(ctx.root.join(".gitattributes")).unwrap_or_default();
    if !gitattributes.contains("filter=lfs") {
        match run_git(&ctx.root, &["lfs", "install"]) {
            Ok(_) => tracing::info!("git lfs initialized"),
            Err(e) => {
                tracing::warn!("git lfs not available ({}), skipping large file tracking", e);
                return Vec::new();
            }
        }
    }

    let threshold_mb = ctx.config.git_lfs_threshold_mb;
    let large = large_files(ctx, threshold_bytes(threshold_mb));
    if large.is_empty() {
        return Vec::new();
    }

    tracing::info!("found {} large files (>{}MB)", large.len(), threshold_mb);
    let tracked = lfs_patterns(&gitattributes);
    let mut added = Vec::new();
    for (path, size) in large {
        tracing::info!("  {} ({:.1}MB)", path, size as f64 / (1024.0 * 1024.0));
        if tracked.contains(path.as_str()) {
            continue;
        }
        match run_git(&ctx.root, &["lfs", "track", &path]) {
            Ok(_) => added.push(path),
            Err(e) => tracing::warn!("failed to track {}: {}", path, e),
        }
    }

    if added.is_empty() {
        tracing::info!("all large files already tracked by git lfs");
    } else {
        tracing::info!(
            "tracking {} new paths with git lfs, remember to commit .gitattributes",
            added.len()
        );
    }
    added
}

/// Files over `threshold` in the output tree and at the project root, as
/// root-relative paths with their sizes.
fn large_files(ctx: &PublishContext, threshold: u64) -> Vec<(String, u64)> {
    let mut found: Vec<(String, u64)> = WalkDir::new(&ctx.output_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| oversized(e.path(), threshold).map(|size| (ctx.relative_to_root(e.path()), size)))
        .collect();

    let root_files = WalkDir::new(&ctx.root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_root_artifact(e.path()));
    for entry in root_files {
        if let Some(size) = oversized(entry.path(), threshold) {
            let rel = ctx.relative_to_root(entry.path());
            if !found.iter().any(|(path, _)| *path == rel) {
                found.push((rel, size));
            }
        }
    }
    found
}

fn oversized(path: &Path, threshold: u64) -> Option<u64> {
    let size = std::fs::metadata(path).ok()?.len();
    (size > threshold).then_some(size)
}

fn is_root_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ROOT_ARTIFACTS.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

/// Patterns already routed through LFS: the first field of each
/// `filter=lfs` line.
fn lfs_patterns(gitattributes: &str) -> HashSet<&str> {
    gitattributes
        .lines()
        .filter(|line| line.contains("filter=lfs"))
        .filter_map(|line| line.split_whitespace().next())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkshopConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, size: usize) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![b'x'; size]).unwrap();
    }

    #[test]
    fn test_large_files_in_output_and_root() {
        let root = TempDir::new().unwrap();
        write(root.path(), "docs/s1/big.zip", 200);
        write(root.path(), "docs/s1/small.zip", 10);
        write(root.path(), "docs/nested/deep/big.pdf", 300);
        write(root.path(), "deck.pptx", 500);
        write(root.path(), "tiny.pdf", 5);
        write(root.path(), "notes.txt", 900);
        write(root.path(), "s1/raw.pdf", 900);

        let ctx = PublishContext::new(WorkshopConfig::default(), root.path().to_path_buf());
        let found = large_files(&ctx, 100);
        let paths: Vec<&str> = found.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["docs/nested/deep/big.pdf", "docs/s1/big.zip", "deck.pptx"]
        );
        assert_eq!(found[2].1, 500);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let root = TempDir::new().unwrap();
        write(root.path(), "docs/exact.bin", 100);
        let ctx = PublishContext::new(WorkshopConfig::default(), root.path().to_path_buf());
        assert!(large_files(&ctx, 100).is_empty());
    }

    #[test]
    fn test_lfs_patterns() {
        let content = "*.psd filter=lfs diff=lfs merge=lfs -text\n\
                       docs/big.zip filter=lfs diff=lfs merge=lfs -text\n\
                       *.txt text eol=lf\n\n";
        let patterns = lfs_patterns(content);
        assert_eq!(patterns.len(), 2);
        assert!(patterns.contains("*.psd"));
        assert!(patterns.contains("docs/big.zip"));
        assert!(!patterns.contains("*.txt"));
    }

    #[test]
    fn test_outside_repository_is_silent() {
        let root = TempDir::new().unwrap();
        write(root.path(), "docs/big.zip", 200);
        let config = WorkshopConfig::from_yaml("git_lfs_threshold_mb: 0").unwrap();
        let ctx = PublishContext::new(config, root.path().to_path_buf());
        assert!(track_large_files(&ctx).is_empty());
        assert!(!root.path().join(".gitattributes").exists());
    }
}
