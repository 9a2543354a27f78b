//! Run-wide context shared by every build component.

use std::path::{Path, PathBuf};

use crate::config::WorkshopConfig;

/// Explicit context passed into every component instead of relying on the
/// process working directory.
#[derive(Debug, Clone)]
pub struct PublishContext {
    /// Project root; relative paths in the config resolve against it
    pub root: PathBuf,
    /// Absolute output directory
    pub output_dir: PathBuf,
    pub config: WorkshopConfig,
}

impl PublishContext {
    pub fn new(config: WorkshopConfig, root: PathBuf) -> Self {
        let output_dir = if config.output_dir.is_relative() {
            root.join(&config.output_dir)
        } else {
            config.output_dir.clone()
        };
        Self {
            root,
            output_dir,
            config,
        }
    }

    /// Resolve a config-relative path against the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_relative() {
            self.root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Output directory name as written in the config, with forward slashes.
    /// Used when building hosted URLs.
    pub fn output_dir_name(&self) -> String {
        self.config
            .output_dir
            .to_string_lossy()
            .replace('\\', "/")
            .trim_matches('/')
            .to_string()
    }

    /// Path of `file` relative to the project root, with forward slashes.
    /// Falls back to the path as given when it lies outside the root.
    pub fn relative_to_root(&self, file: &Path) -> String {
        let rel = file.strip_prefix(&self.root).unwrap_or(file);
        rel.to_string_lossy().replace('\\', "/")
    }
}
