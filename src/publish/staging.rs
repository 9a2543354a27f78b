use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::PublishError;
use crate::build::PublishContext;

/// Staging directory for the cloud workspace, under the project root.
pub const STAGING_DIR: &str = "build-codespaces";

const DEVCONTAINER_TEMPLATE: &str = "_devcontainer-template";

/// Directories never carried into the workspace.
const SKIPPED_DIRS: &[&str] = &["__pycache__", ".ipynb_checkpoints"];

const README: &str = "# Codespaces Workspace\n\n\
This branch contains notebooks and data for GitHub Codespaces.\n\n\
- Open in Codespaces using the workshop link.\n\
- Python packages are listed in requirements.txt.\n";

/// Rebuild the staging tree: requirements, devcontainer, section folders
/// and a README. Returns the staging directory.
pub fn prepare_staging(ctx: &PublishContext) -> Result<PathBuf, PublishError> {
    let staging = ctx.root.join(STAGING_DIR);
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| PublishError::Io { path, source }
    };

    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(io_err(&staging))?;
    }
    std::fs::create_dir_all(&staging).map_err(io_err(&staging))?;

    let requirements = &ctx.config.codespaces.requirements;
    if !requirements.is_empty() {
        let path = staging.join("requirements.txt");
        std::fs::write(&path, format!("{}\n", requirements.join("\n"))).map_err(io_err(&path))?;
        tracing::info!("wrote {}/requirements.txt", STAGING_DIR);
    }

    let devcontainer = ctx.root.join(DEVCONTAINER_TEMPLATE);
    if devcontainer.is_dir() {
        copy_tree(&devcontainer, &staging.join(".devcontainer"))?;
        tracing::info!("copied .devcontainer configuration");
    }

    for section in &ctx.config.sections {
        if section.draft {
            tracing::info!("skipping draft section '{}' in workspace", section.title);
            continue;
        }
        let src = ctx.resolve(&section.folder);
        if !src.is_dir() {
            continue;
        }
        copy_tree(&src, &staging.join(section.folder_name()))?;
        tracing::info!("copied section {}", section.folder);
    }

    let readme = staging.join("README.md");
    if !readme.exists() {
        std::fs::write(&readme, README).map_err(io_err(&readme))?;
    }

    Ok(staging)
}

/// Recursively copy `src` into `dest`, leaving out [`SKIPPED_DIRS`].
pub(super) fn copy_tree(src: &Path, dest: &Path) -> Result<(), PublishError> {
    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIPPED_DIRS.iter().any(|s| e.file_name() == *s))
        });

    for entry in walker {
        let entry = entry.map_err(|source| PublishError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        let result = if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
        } else {
            std::fs::copy(entry.path(), &target).map(|_| ())
        };
        result.map_err(|source| PublishError::Io {
            path: target.clone(),
            source,
        })?;
    }
    Ok(())
}
