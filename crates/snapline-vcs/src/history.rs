use snapline_core::error::VcsError;
use snapline_core::types::GitInfo;
use std::path::Path;

/// Read-only view of the commit DAG the baseline algorithms run against.
///
/// Calls are synchronous against the repository on disk and are never retried:
/// a failure here means the environment is misconfigured.
pub trait CommitHistory: Send + Sync {
    /// Working-tree root of the repository.
    fn repository_root(&self) -> &Path;

    /// Commit, branch and commit time of HEAD. A detached HEAD reports the
    /// branch as `HEAD`.
    fn head_info(&self) -> Result<GitInfo, VcsError>;

    /// Up to `limit` commits reachable from HEAD, newest first, committed at or
    /// after `since_secs`, excluding everything reachable from `excluding`.
    fn list_commits_since(
        &self,
        since_secs: Option<i64>,
        limit: usize,
        excluding: &[String],
    ) -> Result<Vec<String>, VcsError>;

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, VcsError>;

    /// Paths changed between `base` and `head`, or between `base` and the
    /// working tree when `head` is `None`.
    fn diff_name_only(&self, base: &str, head: Option<&str>) -> Result<Vec<String>, VcsError>;

    fn commit_exists(&self, commit: &str) -> bool;

    /// The subset of `commits` that is not an ancestor of any other member,
    /// newest first.
    fn maximally_descendant(&self, commits: &[String]) -> Result<Vec<String>, VcsError>;

    /// Contents of `path` at `commit`, or in the working tree when `commit` is
    /// `None`. `Ok(None)` when the file does not exist there.
    fn read_file_at(&self, commit: Option<&str>, path: &str) -> Result<Option<String>, VcsError>;
}
