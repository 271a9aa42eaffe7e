use crate::error::BaselineError;
use snapline_core::config::BaselineConfig;
use snapline_core::constants::{DETACHED_HEAD_BRANCH, INITIAL_COMMIT_LIMIT};
use snapline_core::types::GitInfo;
use snapline_index::port::{BranchBuild, BuildIndex, FirstAndLastBuild};
use snapline_vcs::CommitHistory;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Do not seed the search with the branch's latest build.
    pub ignore_last_build_on_branch: bool,
    /// Commits requested by the first history query; doubled on every round.
    pub initial_limit: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            ignore_last_build_on_branch: false,
            initial_limit: INITIAL_COMMIT_LIMIT,
        }
    }
}

impl ResolveOptions {
    pub fn from_config(config: &BaselineConfig) -> Self {
        Self {
            ignore_last_build_on_branch: config.ignore_last_build_on_branch,
            initial_limit: config.initial_limit,
        }
    }
}

/// Commits already classified during one resolution.
#[derive(Default)]
struct Search {
    with_builds: Vec<String>,
    without_builds: Vec<String>,
    /// Commits known to the index but absent locally (rebased or squashed
    /// away). Reported as-is, never fed to history queries.
    extra_parents: Vec<String>,
    seen: HashSet<String>,
}

impl Search {
    fn add_with_build(&mut self, commit: String) {
        if self.seen.insert(commit.clone()) {
            self.with_builds.push(commit);
        }
    }

    fn add_without_build(&mut self, commit: String) {
        if self.seen.insert(commit.clone()) {
            self.without_builds.push(commit);
        }
    }

    fn add_extra(&mut self, commit: String) {
        if self.seen.insert(commit.clone()) {
            self.extra_parents.push(commit);
        }
    }
}

/// Find the minimal covering set of ancestor commits that have builds.
///
/// Every commit reachable from HEAD that has a build is either in the result
/// or is an ancestor of a commit in the result, and no result commit is an
/// ancestor of another. Commits the index knows about but the repository does
/// not (the branch's last build after a rebase, the head of a squash-merged
/// pull request) are listed first and are not checked against each other.
pub fn resolve_parent_commits(
    history: &dyn CommitHistory,
    index: &dyn BuildIndex,
    git: &GitInfo,
    options: &ResolveOptions,
) -> Result<Vec<String>, BaselineError> {
    let FirstAndLastBuild {
        first_build,
        last_build_on_branch,
    } = index.first_and_last_build(&git.branch)?;

    let Some(first_build) = first_build else {
        debug!("project has no builds yet");
        return Ok(Vec::new());
    };
    // Nothing older than the first build can have one.
    let since_secs = first_build.committed_at.map(|ms| ms.div_euclid(1000));

    let mut search = Search::default();
    if let Some(last) = last_build_on_branch
        && seeds_search(git, &last, options)
    {
        if history.commit_exists(&last.commit) {
            debug!(commit = %last.commit, branch = %git.branch, "seeding search with last build on branch");
            search.add_with_build(last.commit);
        } else {
            debug!(commit = %last.commit, branch = %git.branch, "last build on branch is not in the repository; assuming rebase");
            search.add_extra(last.commit);
        }
    }

    let mut limit = options.initial_limit.max(1);
    loop {
        let candidates = history.list_commits_since(
            since_secs,
            limit + search.without_builds.len(),
            &search.with_builds,
        )?;
        let fresh: Vec<String> = candidates
            .into_iter()
            .filter(|commit| !search.seen.contains(commit))
            .collect();
        if fresh.is_empty() {
            break;
        }

        let built: HashSet<String> = index.has_builds_with_commits(&fresh)?.into_iter().collect();
        debug!(
            limit,
            checked = fresh.len(),
            with_builds = built.len(),
            "checked commits for builds"
        );
        for commit in fresh {
            if built.contains(&commit) {
                search.add_with_build(commit);
            } else {
                search.add_without_build(commit);
            }
        }
        limit = limit.saturating_mul(2);
    }

    // A squash-merged pull request leaves no trace of its head commits in
    // history; the index remembers which build its head branch last had.
    if !search.without_builds.is_empty() {
        let merged = index.merged_pull_requests_for(&search.without_builds, &git.branch)?;
        for pr in merged {
            let head = pr.last_head_build_commit;
            if search.seen.contains(&head) {
                continue;
            }
            debug!(merge_commit = %pr.commit, head_build_commit = %head, "found build on merged pull request head");
            if history.commit_exists(&head) {
                search.add_with_build(head);
            } else {
                search.add_extra(head);
            }
        }
    }

    let descendants = match history.maximally_descendant(&search.with_builds) {
        Ok(descendants) => descendants,
        Err(e) => {
            warn!(error = %e, "could not reduce commits with builds to a covering set; continuing without baselines");
            return Ok(Vec::new());
        }
    };
    debug!(
        with_builds = search.with_builds.len(),
        kept = descendants.len(),
        extra = search.extra_parents.len(),
        "resolved parent commits"
    );

    let mut emitted = HashSet::new();
    Ok(search
        .extra_parents
        .into_iter()
        .chain(descendants)
        .filter(|commit| emitted.insert(commit.clone()))
        .collect())
}

fn seeds_search(git: &GitInfo, last: &BranchBuild, options: &ResolveOptions) -> bool {
    if options.ignore_last_build_on_branch || git.branch == DETACHED_HEAD_BRANCH {
        return false;
    }
    // A build on a commit newer than ours cannot be our ancestor.
    last.committed_at
        .is_none_or(|committed_at| committed_at <= git.committed_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_index::fixture::{FixtureBuildIndex, build};
    use snapline_vcs::Git2CommitHistory;
    use snapline_vcs::testing::TestRepo;
    use std::sync::Mutex;

    fn git_info(history: &Git2CommitHistory) -> GitInfo {
        history.head_info().unwrap()
    }

    fn resolve(repo: &TestRepo, index: &dyn BuildIndex, options: ResolveOptions) -> Vec<String> {
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        resolve_parent_commits(&history, index, &git_info(&history), &options).unwrap()
    }

    fn is_ancestor(repo: &TestRepo, ancestor: &str, descendant: &str) -> bool {
        let git = git2::Repository::open(repo.path()).unwrap();
        git.graph_descendant_of(
            git2::Oid::from_str(descendant).unwrap(),
            git2::Oid::from_str(ancestor).unwrap(),
        )
        .unwrap()
    }

    /// ```text
    /// A - B - C - D ----- F
    ///      \             /
    ///       E -----------
    /// ```
    struct Merged {
        repo: TestRepo,
        c: String,
        d: String,
        e: String,
    }

    fn merged_history() -> Merged {
        let repo = TestRepo::new();
        let a = repo.commit("A", &[], &[("a.txt", "a")], 1_000);
        let b = repo.commit("B", &[&a], &[("b.txt", "b")], 2_000);
        let c = repo.commit("C", &[&b], &[("c.txt", "c")], 3_000);
        let d = repo.commit("D", &[&c], &[("d.txt", "d")], 4_000);
        let e = repo.commit("E", &[&b], &[("e.txt", "e")], 5_000);
        let f = repo.commit("F", &[&d, &e], &[("e.txt", "e")], 6_000);
        repo.checkout_branch("main", &f);
        Merged { repo, c, d, e }
    }

    #[test]
    fn no_builds_means_no_parents() {
        let m = merged_history();
        let parents = resolve(&m.repo, &FixtureBuildIndex::default(), ResolveOptions::default());
        assert!(parents.is_empty());
    }

    #[test]
    fn builds_outside_history_yield_no_parents() {
        let m = merged_history();
        let index = FixtureBuildIndex::default().with_build(build(
            1,
            &"9".repeat(40),
            "other",
            3_000_000,
        ));
        assert!(resolve(&m.repo, &index, ResolveOptions::default()).is_empty());
    }

    #[test]
    fn merge_commit_yields_both_branch_tips() {
        let m = merged_history();
        let index = FixtureBuildIndex::default()
            .with_build(build(1, &m.c, "main", 3_000_000))
            .with_build(build(2, &m.d, "main", 4_000_000))
            .with_build(build(3, &m.e, "feature", 5_000_000));

        let parents = resolve(&m.repo, &index, ResolveOptions::default());
        assert_eq!(parents, vec![m.e.clone(), m.d.clone()]);

        // Without the branch seed the walk reaches C as well, which D covers.
        let parents = resolve(
            &m.repo,
            &index,
            ResolveOptions {
                ignore_last_build_on_branch: true,
                ..ResolveOptions::default()
            },
        );
        assert_eq!(parents, vec![m.e, m.d]);
    }

    #[test]
    fn rebased_branch_keeps_its_last_build() {
        // main: A - B - C; feature was rebased onto C as E, so its old build
        // commit D no longer exists locally.
        let repo = TestRepo::new();
        let a = repo.commit("A", &[], &[("a.txt", "a")], 1_000);
        let b = repo.commit("B", &[&a], &[("b.txt", "b")], 2_000);
        let c = repo.commit("C", &[&b], &[("c.txt", "c")], 3_000);
        let e = repo.commit("E", &[&c], &[("e.txt", "e")], 5_000);
        repo.checkout_branch("feature", &e);
        let d = "d".repeat(40);

        let index = FixtureBuildIndex::default()
            .with_build(build(1, &c, "main", 3_000_000))
            .with_build(build(2, &d, "feature", 4_000_000));

        assert_eq!(resolve(&repo, &index, ResolveOptions::default()), vec![d, c]);
    }

    #[test]
    fn detached_head_ignores_branch_build() {
        let repo = TestRepo::new();
        let a = repo.commit("A", &[], &[("a.txt", "a")], 1_000);
        let b = repo.commit("B", &[&a], &[("b.txt", "b")], 2_000);
        repo.checkout_detached(&b);

        let index = FixtureBuildIndex::default()
            .with_build(build(1, &a, "main", 1_000_000))
            .with_build(build(2, &"f".repeat(40), "HEAD", 1_500_000));

        assert_eq!(resolve(&repo, &index, ResolveOptions::default()), vec![a]);
    }

    #[test]
    fn newer_branch_build_is_not_a_parent() {
        let repo = TestRepo::new();
        let a = repo.commit("A", &[], &[("a.txt", "a")], 1_000);
        let b = repo.commit("B", &[&a], &[("b.txt", "b")], 2_000);
        repo.checkout_branch("main", &b);
        let future = "e".repeat(40);

        let index = FixtureBuildIndex::default()
            .with_build(build(1, &a, "main", 1_000_000))
            .with_build(build(2, &future, "main", 9_000_000));

        assert_eq!(resolve(&repo, &index, ResolveOptions::default()), vec![a]);
    }

    #[test]
    fn search_widens_until_history_is_exhausted() {
        let repo = TestRepo::new();
        let mut commits = Vec::new();
        let mut parent: Option<String> = None;
        for i in 0..60 {
            let parents: Vec<&str> = parent.iter().map(String::as_str).collect();
            let counter = i.to_string();
            let commit = repo.commit(
                &format!("commit {i}"),
                &parents,
                &[("counter.txt", counter.as_str())],
                1_000 + i,
            );
            commits.push(commit.clone());
            parent = Some(commit);
        }
        repo.checkout_branch("main", commits.last().unwrap());

        let index = CountingIndex::new(
            FixtureBuildIndex::default().with_build(build(1, &commits[3], "old", 1_003_000)),
        );
        let parents = resolve(
            &repo,
            &index,
            ResolveOptions {
                initial_limit: 4,
                ..ResolveOptions::default()
            },
        );
        assert_eq!(parents, vec![commits[3].clone()]);
        // 4 + 8 + 16 + 32 fresh commits cover the 57 newer than the floor.
        assert_eq!(*index.batches.lock().unwrap(), vec![4, 8, 16, 29]);
    }

    #[test]
    fn squash_merged_pull_request_contributes_its_head_build() {
        // main: A - B - S (squash of the feature branch A - H)
        let repo = TestRepo::new();
        let a = repo.commit("A", &[], &[("a.txt", "a")], 1_000);
        let h = repo.commit("H", &[&a], &[("h.txt", "h")], 1_500);
        let b = repo.commit("B", &[&a], &[("b.txt", "b")], 2_000);
        let s = repo.commit("S", &[&b], &[("h.txt", "h")], 3_000);
        repo.checkout_branch("main", &s);

        let index = FixtureBuildIndex::default()
            .with_build(build(1, &a, "main", 1_000_000))
            .with_build(build(2, &h, "feature", 1_500_000))
            .with_merged_pull_request(&s, &h);

        // H descends from A, so A is covered.
        assert_eq!(resolve(&repo, &index, ResolveOptions::default()), vec![h]);
    }

    #[test]
    fn squash_merged_head_missing_locally_is_kept_unvalidated() {
        let repo = TestRepo::new();
        let a = repo.commit("A", &[], &[("a.txt", "a")], 1_000);
        let s = repo.commit("S", &[&a], &[("h.txt", "h")], 3_000);
        repo.checkout_branch("main", &s);
        let gone = "c".repeat(40);

        let index = FixtureBuildIndex::default()
            .with_build(build(1, &a, "main", 1_000_000))
            .with_build(build(2, &gone, "feature", 2_000_000))
            .with_merged_pull_request(&s, &gone);

        assert_eq!(
            resolve(
                &repo,
                &index,
                ResolveOptions {
                    ignore_last_build_on_branch: true,
                    ..ResolveOptions::default()
                }
            ),
            vec![gone, a]
        );
    }

    /// Builds a pseudo-random DAG and checks the result is complete and free
    /// of redundant ancestors.
    #[test]
    fn covering_set_is_complete_and_minimal() {
        for seed in [1_u64, 7, 42, 1234] {
            let mut rng = seed;
            let mut next = move || {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                rng >> 33
            };

            let repo = TestRepo::new();
            let mut commits: Vec<String> = Vec::new();
            let mut index = FixtureBuildIndex::default();
            let mut number = 0;
            for i in 0..40_i64 {
                let parents: Vec<String> = match commits.len() {
                    0 => Vec::new(),
                    n => {
                        let first = commits[n - 1 - (next() as usize % n.min(4))].clone();
                        if n > 2 && next() % 4 == 0 {
                            let second = commits[next() as usize % n].clone();
                            if second != first {
                                vec![first, second]
                            } else {
                                vec![first]
                            }
                        } else {
                            vec![first]
                        }
                    }
                };
                let parent_refs: Vec<&str> = parents.iter().map(String::as_str).collect();
                let time = 10_000 + i * 10;
                let counter = i.to_string();
                let commit = repo.commit(
                    &format!("c{i}"),
                    &parent_refs,
                    &[("n.txt", counter.as_str())],
                    time,
                );
                if next() % 3 == 0 {
                    number += 1;
                    index = index.with_build(build(number, &commit, "side", time * 1000));
                }
                commits.push(commit);
            }
            let head = commits.last().unwrap().clone();
            repo.checkout_branch("main", &head);

            let parents = resolve(
                &repo,
                &index,
                ResolveOptions {
                    initial_limit: 3,
                    ..ResolveOptions::default()
                },
            );

            for (i, x) in parents.iter().enumerate() {
                for y in parents.iter().skip(i + 1) {
                    assert!(!is_ancestor(&repo, x, y), "seed {seed}: {x} is covered by {y}");
                    assert!(!is_ancestor(&repo, y, x), "seed {seed}: {y} is covered by {x}");
                }
            }
            for built in index.builds.iter().map(|b| &b.commit) {
                let reachable = *built == head || is_ancestor(&repo, built, &head);
                if !reachable {
                    continue;
                }
                assert!(
                    parents
                        .iter()
                        .any(|p| p == built || is_ancestor(&repo, built, p)),
                    "seed {seed}: build on {built} is not covered"
                );
            }
        }
    }

    /// Records the size of every `has_builds_with_commits` batch.
    struct CountingIndex {
        inner: FixtureBuildIndex,
        batches: Mutex<Vec<usize>>,
    }

    impl CountingIndex {
        fn new(inner: FixtureBuildIndex) -> Self {
            Self {
                inner,
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl BuildIndex for CountingIndex {
        fn first_and_last_build(
            &self,
            branch: &str,
        ) -> Result<FirstAndLastBuild, snapline_core::error::IndexError> {
            self.inner.first_and_last_build(branch)
        }

        fn has_builds_with_commits(
            &self,
            commits: &[String],
        ) -> Result<Vec<String>, snapline_core::error::IndexError> {
            self.batches.lock().unwrap().push(commits.len());
            self.inner.has_builds_with_commits(commits)
        }

        fn merged_pull_requests_for(
            &self,
            commits: &[String],
            base_branch: &str,
        ) -> Result<Vec<snapline_index::MergedPullRequest>, snapline_core::error::IndexError>
        {
            self.inner.merged_pull_requests_for(commits, base_branch)
        }

        fn ancestor_builds_of(
            &self,
            build_number: u64,
            skip: usize,
            limit: usize,
        ) -> Result<Vec<snapline_core::types::Build>, snapline_core::error::IndexError> {
            self.inner.ancestor_builds_of(build_number, skip, limit)
        }

        fn baseline_builds_for(
            &self,
            branch: &str,
            parent_commits: &[String],
        ) -> Result<Vec<snapline_core::types::Build>, snapline_core::error::IndexError> {
            self.inner.baseline_builds_for(branch, parent_commits)
        }

        fn build_for_commit(
            &self,
            commit: &str,
        ) -> Result<Option<snapline_core::types::Build>, snapline_core::error::IndexError> {
            self.inner.build_for_commit(commit)
        }
    }
}
