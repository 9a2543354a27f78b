use std::path::Path;

use walkdir::WalkDir;

use super::staging::copy_tree;
use super::{PublishError, PublishOptions, threshold_bytes};
use crate::build::PublishContext;
use crate::git::{GitError, GitRepo, run_git};

const MAIN_COMMIT_MESSAGE: &str = "Publish site updates";

/// What happened to the distribution branch.
#[derive(Debug, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The project is not a git repository
    Skipped,
    /// Committed in a temporary repository and force-pushed
    Pushed,
    /// Committed in a temporary repository without pushing
    Prepared,
}

/// Commit everything in the working tree on `github_branch` and push it.
///
/// Switches to the branch first when another one is checked out, and
/// back afterwards. Outside a repository this does nothing.
pub fn commit_main(ctx: &PublishContext) -> Result<(), PublishError> {
    let Some(repo) = GitRepo::discover(&ctx.root) else {
        tracing::warn!("not in a git repository, skipping commit on the main branch");
        return Ok(());
    };

    let branch = ctx.config.github_branch.as_str();
    let current = repo.current_branch();
    let switched_from = match current {
        Some(current) if current != branch => {
            tracing::info!("switching from {} to {} to commit site changes", current, branch);
            run_git(&ctx.root, &["switch", branch])?;
            Some(current)
        }
        _ => None,
    };

    run_git(&ctx.root, &["add", "-A"])?;
    let committed = commit(&ctx.root, MAIN_COMMIT_MESSAGE)?;
    if !committed {
        tracing::info!("no changes to commit on {}", branch);
    }

    tracing::info!("pushing changes to origin/{}", branch);
    run_git(&ctx.root, &["push", "origin", branch])?;
    if committed {
        tracing::info!("pushed {} branch changes", branch);
    } else {
        tracing::info!("{} is up to date on remote", branch);
    }

    if let Some(previous) = switched_from {
        match run_git(&ctx.root, &["switch", &previous]) {
            Ok(_) => tracing::info!("switched back to {}", previous),
            Err(e) => tracing::warn!("could not switch back to {}: {}", previous, e),
        }
    }
    Ok(())
}

/// Rebuild `notebooks_branch` from the staging tree as a single orphan
/// commit in a temporary repository, pushing it over the remote branch
/// when `options.commit` is set.
pub fn publish_distribution_branch(
    ctx: &PublishContext,
    staging: &Path,
    options: PublishOptions,
) -> Result<BranchOutcome, PublishError> {
    let Some(repo) = GitRepo::discover(&ctx.root) else {
        tracing::warn!("not in a git repository, skipping workspace branch");
        return Ok(BranchOutcome::Skipped);
    };
    let remote_url = repo.origin_url()?;

    if !staging.is_dir() {
        return Err(PublishError::MissingStaging(staging.to_path_buf()));
    }

    let branch = ctx.config.notebooks_branch.as_str();
    let temp = tempfile::Builder::new()
        .prefix("publish-codespaces-")
        .tempdir()
        .map_err(|source| PublishError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    let work = temp.path();
    tracing::debug!("assembling {} in {}", branch, work.display());

    run_git(work, &["init"])?;
    if let Err(e) = run_git(work, &["lfs", "install"]) {
        tracing::debug!("git lfs install in temporary repository failed: {}", e);
    }
    run_git(work, &["remote", "add", "origin", &remote_url])?;
    run_git(work, &["checkout", "--orphan", branch])?;

    copy_tree(staging, work)?;

    let project_attributes = std::fs::read_to_string(ctx.root.join(".gitattributes")).ok();
    let lines = gitattributes_lines(
        staging,
        threshold_bytes(ctx.config.git_lfs_threshold_mb),
        project_attributes.as_deref(),
    );
    if !lines.is_empty() {
        let path = work.join(".gitattributes");
        std::fs::write(&path, lines.concat()).map_err(|source| PublishError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!("wrote .gitattributes with {} entries", lines.len());
    }

    run_git(work, &["add", "."])?;
    let message = format!("Update {branch} branch with notebooks and data");
    if !commit(work, &message)? {
        tracing::info!("nothing to commit in temporary repository, proceeding");
    }

    let outcome = if options.commit {
        tracing::info!("pushing {} to origin", branch);
        run_git(work, &["push", "-f", "origin", branch])?;
        BranchOutcome::Pushed
    } else {
        let location = if options.keep_temp {
            work.display().to_string()
        } else {
            "the temporary repository (rerun with --keep-temp to keep it)".to_string()
        };
        tracing::info!(
            "dry run: to push, rerun with --commit or run `git push -f origin {}` in {}",
            branch,
            location
        );
        BranchOutcome::Prepared
    };

    tracing::info!("prepared {} from temporary location", branch);
    tracing::info!(
        "Codespaces URL: https://codespaces.new/{}?ref={}",
        ctx.config.github_repo,
        branch
    );

    if options.keep_temp {
        let kept = temp.keep();
        tracing::info!("kept temporary repository at {}", kept.display());
    }
    Ok(outcome)
}

/// Commit staged changes. `Ok(false)` when there was nothing to commit.
fn commit(cwd: &Path, message: &str) -> Result<bool, GitError> {
    match run_git(cwd, &["commit", "-m", message]) {
        Ok(_) => Ok(true),
        Err(e) if e.is_nothing_to_commit() => Ok(false),
        Err(e) => Err(e),
    }
}

/// LFS attribute lines for staged files over `threshold`, followed by the
/// project's own attribute lines that are not already present.
fn gitattributes_lines(staging: &Path, threshold: u64, project: Option<&str>) -> Vec<String> {
    let mut lines: Vec<String> = WalkDir::new(staging)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.metadata().is_ok_and(|m| m.len() > threshold))
        .filter_map(|e| {
            let rel = e.path().strip_prefix(staging).ok()?;
            let rel = rel.to_string_lossy().replace('\\', "/");
            Some(format!("{rel} filter=lfs diff=lfs merge=lfs -text\n"))
        })
        .collect();

    for line in project.unwrap_or_default().split_inclusive('\n') {
        if !lines.iter().any(|l| l == line) {
            lines.push(line.to_string());
        }
    }
    lines
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
    fn test_gitattributes_lines() {
        let staging = TempDir::new().unwrap();
        write(staging.path(), "s1/data/big.csv", 50);
        write(staging.path(), "s1/small.csv", 5);
        write(staging.path(), "huge.zip", 60);

        let project = "*.pdf filter=lfs diff=lfs merge=lfs -text\nhuge.zip filter=lfs diff=lfs merge=lfs -text\n*.txt text";
        let lines = gitattributes_lines(staging.path(), 10, Some(project));
        assert_eq!(
            lines,
            vec![
                "huge.zip filter=lfs diff=lfs merge=lfs -text\n",
                "s1/data/big.csv filter=lfs diff=lfs merge=lfs -text\n",
                "*.pdf filter=lfs diff=lfs merge=lfs -text\n",
                "*.txt text",
            ]
        );
    }

    #[test]
    fn test_gitattributes_lines_empty() {
        let staging = TempDir::new().unwrap();
        write(staging.path(), "a.csv", 5);
        assert!(gitattributes_lines(staging.path(), 10, None).is_empty());
    }

    #[test]
    fn test_outside_repository_is_skipped() {
        let root = TempDir::new().unwrap();
        let ctx = PublishContext::new(WorkshopConfig::default(), root.path().to_path_buf());
        let outcome = publish_distribution_branch(
            &ctx,
            &root.path().join("build-codespaces"),
            PublishOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome, BranchOutcome::Skipped);
        commit_main(&ctx).unwrap();
    }

    #[test]
    fn test_missing_origin_is_fatal() {
        let root = TempDir::new().unwrap();
        git2::Repository::init(root.path()).unwrap();
        let ctx = PublishContext::new(WorkshopConfig::default(), root.path().to_path_buf());
        let result = publish_distribution_branch(
            &ctx,
            &root.path().join("build-codespaces"),
            PublishOptions::default(),
        );
        assert!(matches!(
            result,
            Err(PublishError::Git(GitError::MissingOrigin))
        ));
    }

    #[test]
    fn test_missing_staging_is_fatal() {
        let root = TempDir::new().unwrap();
        let repo = git2::Repository::init(root.path()).unwrap();
        repo.remote("origin", "https://example.com/me/workshop.git")
            .unwrap();
        let ctx = PublishContext::new(WorkshopConfig::default(), root.path().to_path_buf());
        let result = publish_distribution_branch(
            &ctx,
            &root.path().join("build-codespaces"),
            PublishOptions::default(),
        );
        assert!(matches!(result, Err(PublishError::MissingStaging(_))));
    }
}
