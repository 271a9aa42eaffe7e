use serde::{Deserialize, Serialize};
use snapline_core::error::IndexError;
use snapline_core::types::Build;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstBuild {
    #[serde(default)]
    pub committed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchBuild {
    pub commit: String,
    #[serde(default)]
    pub committed_at: Option<i64>,
}

/// The project's first build (search floor) and the latest build on a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstAndLastBuild {
    /// `None` when the project has never been built.
    pub first_build: Option<FirstBuild>,
    pub last_build_on_branch: Option<BranchBuild>,
}

/// A pull request merged (or squash-merged) as `commit`, whose head branch had
/// a build on `last_head_build_commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPullRequest {
    pub commit: String,
    pub last_head_build_commit: String,
}

/// Query contract of the remote build index.
///
/// Implementations are expected to retry transient failures themselves; an
/// error returned here is final for the run.
pub trait BuildIndex: Send + Sync {
    fn first_and_last_build(&self, branch: &str) -> Result<FirstAndLastBuild, IndexError>;

    /// The subset of `commits` that have at least one build.
    fn has_builds_with_commits(&self, commits: &[String]) -> Result<Vec<String>, IndexError>;

    fn merged_pull_requests_for(
        &self,
        commits: &[String],
        base_branch: &str,
    ) -> Result<Vec<MergedPullRequest>, IndexError>;

    /// Ancestor builds of build `build_number`, nearest first.
    fn ancestor_builds_of(
        &self,
        build_number: u64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Build>, IndexError>;

    /// The builds to compare against, one per parent commit that has one.
    fn baseline_builds_for(
        &self,
        branch: &str,
        parent_commits: &[String],
    ) -> Result<Vec<Build>, IndexError>;

    /// The most recent build recorded for `commit`, if any.
    fn build_for_commit(&self, commit: &str) -> Result<Option<Build>, IndexError>;
}
