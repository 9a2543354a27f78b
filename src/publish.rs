//! The publish stage: everything after the static site is built.
//!
//! 1. Tag large outputs for LFS in the working tree
//! 2. Optionally commit and push the source branch
//! 3. Assemble the cloud workspace staging tree
//! 4. Rebuild the distribution branch in a throwaway repository

mod branch;
mod lfs;
mod staging;

use std::path::PathBuf;

use crate::build::PublishContext;
use crate::git::GitError;

pub use branch::{BranchOutcome, commit_main, publish_distribution_branch};
pub use lfs::track_large_files;
pub use staging::prepare_staging;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("staging directory {0} not found, nothing to publish")]
    MissingStaging(PathBuf),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Push the source branch and the distribution branch
    pub commit: bool,
    /// Leave the temporary distribution repository on disk
    pub keep_temp: bool,
}

#[derive(Debug)]
pub struct PublishReport {
    /// Paths newly handed to `git lfs track`
    pub lfs_tracked: Vec<String>,
    pub staging_dir: PathBuf,
    pub branch: BranchOutcome,
}

/// Run the whole publish stage for an already built site.
pub fn publish(ctx: &PublishContext, options: PublishOptions) -> Result<PublishReport, PublishError> {
    let lfs_tracked = track_large_files(ctx);

    if options.commit {
        commit_main(ctx)?;
    }

    let staging_dir = prepare_staging(ctx)?;
    let branch = publish_distribution_branch(ctx, &staging_dir, options)?;

    Ok(PublishReport {
        lfs_tracked,
        staging_dir,
        branch,
    })
}

/// Size limit above which a file goes to LFS.
pub(crate) fn threshold_bytes(megabytes: u64) -> u64 {
    megabytes.saturating_mul(1024 * 1024)
}
