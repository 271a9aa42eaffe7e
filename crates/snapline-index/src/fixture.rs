use crate::port::{BranchBuild, BuildIndex, FirstAndLastBuild, FirstBuild, MergedPullRequest};
use serde::{Deserialize, Serialize};
use snapline_core::error::IndexError;
use snapline_core::types::Build;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// A recorded snapshot of the build index, used for offline runs and tests.
///
/// Answers are derived from the list of builds: the "last build" of a branch is
/// the highest-numbered build on it, and baselines are the highest-numbered
/// clean build per parent commit. Ancestor build chains are listed explicitly
/// by build number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBuildIndex {
    #[serde(default)]
    pub builds: Vec<Build>,
    #[serde(default)]
    pub merged_pull_requests: Vec<MergedPullRequest>,
    /// Build number → ancestor build numbers, nearest first.
    #[serde(default)]
    pub ancestors: BTreeMap<u64, Vec<u64>>,
}

impl FixtureBuildIndex {
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| IndexError::Decode(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| IndexError::Decode(format!("{}: {e}", path.display())))
    }

    pub fn with_build(mut self, build: Build) -> Self {
        self.builds.push(build);
        self
    }

    pub fn with_merged_pull_request(mut self, commit: &str, last_head_build_commit: &str) -> Self {
        self.merged_pull_requests.push(MergedPullRequest {
            commit: commit.to_string(),
            last_head_build_commit: last_head_build_commit.to_string(),
        });
        self
    }

    pub fn with_ancestors(mut self, build_number: u64, ancestors: Vec<u64>) -> Self {
        self.ancestors.insert(build_number, ancestors);
        self
    }

    fn latest<'a>(&'a self, mut predicate: impl FnMut(&Build) -> bool) -> Option<&'a Build> {
        self.builds
            .iter()
            .filter(|build| predicate(build))
            .max_by_key(|build| build.number)
    }
}

/// Shorthand for fixture builds: a clean build of `commit` on `branch`.
pub fn build(number: u64, commit: &str, branch: &str, committed_at: i64) -> Build {
    Build {
        id: format!("Build:{number}"),
        number,
        commit: commit.to_string(),
        committed_at: Some(committed_at),
        status: Default::default(),
        uncommitted_hash: None,
        is_local_build: false,
        branch: Some(branch.to_string()),
    }
}

impl BuildIndex for FixtureBuildIndex {
    fn first_and_last_build(&self, branch: &str) -> Result<FirstAndLastBuild, IndexError> {
        let first_build = self
            .builds
            .iter()
            .min_by_key(|build| build.number)
            .map(|build| FirstBuild {
                committed_at: build.committed_at,
            });
        let last_build_on_branch = self
            .latest(|build| build.branch.as_deref() == Some(branch))
            .map(|build| BranchBuild {
                commit: build.commit.clone(),
                committed_at: build.committed_at,
            });
        Ok(FirstAndLastBuild {
            first_build,
            last_build_on_branch,
        })
    }

    fn has_builds_with_commits(&self, commits: &[String]) -> Result<Vec<String>, IndexError> {
        let built: HashSet<&str> = self
            .builds
            .iter()
            .filter(|build| !build.is_dirty())
            .map(|build| build.commit.as_str())
            .collect();
        Ok(commits
            .iter()
            .filter(|commit| built.contains(commit.as_str()))
            .cloned()
            .collect())
    }

    fn merged_pull_requests_for(
        &self,
        commits: &[String],
        _base_branch: &str,
    ) -> Result<Vec<MergedPullRequest>, IndexError> {
        Ok(self
            .merged_pull_requests
            .iter()
            .filter(|pr| commits.contains(&pr.commit))
            .cloned()
            .collect())
    }

    fn ancestor_builds_of(
        &self,
        build_number: u64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Build>, IndexError> {
        let Some(chain) = self.ancestors.get(&build_number) else {
            return Ok(Vec::new());
        };
        Ok(chain
            .iter()
            .skip(skip)
            .take(limit)
            .filter_map(|number| self.builds.iter().find(|b| b.number == *number))
            .cloned()
            .collect())
    }

    fn baseline_builds_for(
        &self,
        _branch: &str,
        parent_commits: &[String],
    ) -> Result<Vec<Build>, IndexError> {
        Ok(parent_commits
            .iter()
            .filter_map(|commit| self.latest(|build| build.commit == *commit))
            .cloned()
            .collect())
    }

    fn build_for_commit(&self, commit: &str) -> Result<Option<Build>, IndexError> {
        Ok(self.latest(|build| build.commit == commit).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FixtureBuildIndex {
        FixtureBuildIndex::default()
            .with_build(build(1, "a", "main", 1_000))
            .with_build(build(2, "b", "main", 2_000))
            .with_build(build(3, "c", "feature", 3_000))
            .with_ancestors(3, vec![2, 1])
    }

    #[test]
    fn first_and_last_build_per_branch() {
        let index = index();
        let result = index.first_and_last_build("main").unwrap();
        assert_eq!(result.first_build.unwrap().committed_at, Some(1_000));
        assert_eq!(result.last_build_on_branch.unwrap().commit, "b");
        assert!(
            index
                .first_and_last_build("other")
                .unwrap()
                .last_build_on_branch
                .is_none()
        );
    }

    #[test]
    fn dirty_builds_do_not_count_as_built_commits() {
        let mut dirty = build(4, "d", "main", 4_000);
        dirty.uncommitted_hash = Some("abc".into());
        let index = index().with_build(dirty);
        assert_eq!(
            index
                .has_builds_with_commits(&["a".into(), "d".into(), "z".into()])
                .unwrap(),
            vec!["a".to_string()]
        );
    }

    #[test]
    fn ancestor_pages_follow_the_chain() {
        let index = index();
        let page = index.ancestor_builds_of(3, 1, 5).unwrap();
        assert_eq!(page.iter().map(|b| b.number).collect::<Vec<_>>(), vec![1]);
        assert!(index.ancestor_builds_of(1, 0, 5).unwrap().is_empty());
    }

    #[test]
    fn loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"{
                "builds": [{"id": "Build:7", "number": 7, "commit": "abc", "branch": "main"}],
                "mergedPullRequests": [{"commit": "m", "lastHeadBuildCommit": "abc"}],
                "ancestors": {"7": []}
            }"#,
        )
        .unwrap();
        let index = FixtureBuildIndex::load(&path).unwrap();
        assert_eq!(index.builds[0].number, 7);
        assert_eq!(
            index
                .baseline_builds_for("main", &["abc".into()])
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            index
                .merged_pull_requests_for(&["m".into()], "main")
                .unwrap()[0]
                .last_head_build_commit,
            "abc"
        );
    }
}
