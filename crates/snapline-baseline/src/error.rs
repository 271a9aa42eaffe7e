use snapline_core::error::{IndexError, VcsError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Failure to compute the files changed since a baseline build.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("build #{number} had uncommitted changes")]
    UncommittedBuild { number: u64 },

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl DiffError {
    /// Failures an ancestor build can stand in for: the baseline's commit is
    /// gone from the repository, or the baseline was built from a dirty tree.
    pub fn is_substitutable(&self) -> bool {
        matches!(
            self,
            Self::UncommittedBuild { .. } | Self::Vcs(VcsError::UnknownCommit { .. })
        )
    }
}
