//! Path and URL conversion utilities.
//!
//! This module handles conversions between:
//! - Project paths (files under the project root)
//! - Output paths (where files are written in the output directory)
//! - Link paths (the forward-slash relative links written into pages)

use std::path::{Component, Path, PathBuf};

use url::Url;

/// Get the project root from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where one exists. The filesystem is not consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Compute the relative path from directory `from` to `to`.
///
/// Both paths are normalized lexically first.
///
/// # Examples
/// ```ignore
/// relative_path(Path::new("/site/index.html"), Path::new("/site/section1")) => "../index.html"
/// relative_path(Path::new("/site/a/b.png"), Path::new("/site")) => "a/b.png"
/// ```
pub fn relative_path(to: &Path, from: &Path) -> PathBuf {
    let to = normalize(to);
    let from = normalize(from);
    let to_parts: Vec<_> = to.components().collect();
    let from_parts: Vec<_> = from.components().collect();

    let common = to_parts
        .iter()
        .zip(from_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from_parts.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Render a path as a forward-slash link fragment.
pub fn to_link(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// File name of a slide or asset reference, as written in a link.
pub fn file_name_of(reference: &str) -> String {
    Path::new(reference)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| reference.to_string())
}

/// Whether a reference points at a remote resource.
pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Join `segments` onto `base`, percent-encoding each one. Segments may
/// themselves contain `/`, which is kept as a separator.
///
/// # Examples
/// ```ignore
/// hosted_url("https://github.com", &["me/repo", "raw", "main", "docs/s1/a b.zip"])
///     => "https://github.com/me/repo/raw/main/docs/s1/a%20b.zip"
/// ```
pub fn hosted_url(base: &str, segments: &[&str]) -> String {
    let parts = segments
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty());

    match Url::parse(base) {
        Ok(mut url) => {
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(parts);
            }
            url.to_string()
        }
        Err(_) => {
            let mut url = base.trim_end_matches('/').to_string();
            for part in parts {
                url.push('/');
                url.push_str(part);
            }
            url
        }
    }
}
