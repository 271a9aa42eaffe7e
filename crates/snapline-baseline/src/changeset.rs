use crate::error::DiffError;
use crate::manifest::is_package_manifest;
use crate::substitute::{AncestorSearch, ChangedFilesWithReplacement, changed_files_with_replacement};
use rayon::prelude::*;
use snapline_core::types::{Build, ChangedFileSet, PackageFileChange};
use snapline_index::BuildIndex;
use snapline_vcs::CommitHistory;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Union of the files changed since each baseline build.
///
/// Baselines are diffed in parallel. Any baseline that can neither be diffed
/// nor replaced fails the whole assembly; a partial union would under-report
/// changes. Changed `package.json` files are also listed with the commit they
/// were diffed against so their dependency sections can be compared later.
pub fn assemble_changed_files(
    history: &dyn CommitHistory,
    index: &dyn BuildIndex,
    builds: &[Build],
    search: &AncestorSearch,
) -> Result<ChangedFileSet, DiffError> {
    let results: Vec<ChangedFilesWithReplacement> = builds
        .par_iter()
        .map(|build| changed_files_with_replacement(history, index, build, search))
        .collect::<Result<Vec<_>, _>>()?;

    let mut changed_files = BTreeSet::new();
    let mut replacement_build_ids = Vec::new();
    let mut changed_package_files = Vec::new();
    let mut seen_package_files = HashSet::new();

    for (build, result) in builds.iter().zip(results) {
        let diffed_commit = match &result.replacement_build {
            Some(replacement) => {
                replacement_build_ids.push((build.id.clone(), replacement.id.clone()));
                replacement.commit.clone()
            }
            None => build.commit.clone(),
        };
        for file in result.changed_files {
            if is_package_manifest(&file) && seen_package_files.insert((file.clone(), diffed_commit.clone())) {
                changed_package_files.push(PackageFileChange {
                    path: file.clone(),
                    commit: diffed_commit.clone(),
                });
            }
            changed_files.insert(file);
        }
    }

    debug!(
        baselines = builds.len(),
        changed = changed_files.len(),
        replaced = replacement_build_ids.len(),
        package_files = changed_package_files.len(),
        "assembled changed files"
    );
    Ok(ChangedFileSet {
        changed_files: changed_files.into_iter().collect(),
        replacement_build_ids,
        changed_package_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_core::error::VcsError;
    use snapline_index::fixture::{FixtureBuildIndex, build};
    use snapline_vcs::Git2CommitHistory;
    use snapline_vcs::testing::TestRepo;

    /// ```text
    /// A - B - D (HEAD)
    ///  \     /
    ///   C ---
    /// ```
    fn repo() -> (TestRepo, [String; 4]) {
        let repo = TestRepo::new();
        let a = repo.commit(
            "A",
            &[],
            &[("src/shared.js", "1"), ("package.json", "{}")],
            1_000,
        );
        let b = repo.commit("B", &[&a], &[("src/left.js", "l")], 2_000);
        let c = repo.commit(
            "C",
            &[&a],
            &[("src/right.js", "r"), ("package.json", r#"{"dependencies":{}}"#)],
            3_000,
        );
        let d = repo.commit(
            "D",
            &[&b, &c],
            &[("src/right.js", "r"), ("package.json", r#"{"dependencies":{}}"#)],
            4_000,
        );
        repo.checkout_branch("main", &d);
        repo.write_worktree_file("src/shared.js", "2");
        (repo, [a, b, c, d])
    }

    #[test]
    fn unions_changes_across_baselines() {
        let (repo, [_, b, c, _]) = repo();
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        let builds = vec![build(1, &b, "main", 0), build(2, &c, "feature", 0)];

        let set = assemble_changed_files(
            &history,
            &FixtureBuildIndex::default(),
            &builds,
            &AncestorSearch::default(),
        )
        .unwrap();
        assert_eq!(
            set.changed_files,
            vec!["package.json", "src/left.js", "src/right.js", "src/shared.js"]
        );
        assert!(set.replacement_build_ids.is_empty());
        assert_eq!(
            set.changed_package_files,
            vec![PackageFileChange {
                path: "package.json".into(),
                commit: b,
            }]
        );
    }

    #[test]
    fn union_is_independent_of_baseline_order() {
        let (repo, [a, b, c, _]) = repo();
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        let builds = vec![
            build(1, &a, "main", 0),
            build(2, &b, "main", 0),
            build(3, &c, "feature", 0),
        ];
        let mut reversed = builds.clone();
        reversed.reverse();

        let index = FixtureBuildIndex::default();
        let search = AncestorSearch::default();
        let forward = assemble_changed_files(&history, &index, &builds, &search).unwrap();
        let backward = assemble_changed_files(&history, &index, &reversed, &search).unwrap();
        assert_eq!(forward.changed_files, backward.changed_files);
    }

    #[test]
    fn records_replacements() {
        let (repo, [a, b, _, _]) = repo();
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        let rebased_away = build(3, &"0".repeat(40), "feature", 0);
        let index = FixtureBuildIndex::default()
            .with_build(rebased_away.clone())
            .with_build(build(1, &a, "main", 0))
            .with_ancestors(3, vec![1]);

        let set = assemble_changed_files(
            &history,
            &index,
            &[build(2, &b, "main", 0), rebased_away],
            &AncestorSearch::default(),
        )
        .unwrap();
        assert_eq!(
            set.replacement_build_ids,
            vec![("Build:3".to_string(), "Build:1".to_string())]
        );
        assert!(
            set.changed_package_files
                .iter()
                .any(|change| change.commit == a)
        );
    }

    #[test]
    fn one_unusable_baseline_fails_the_assembly() {
        let (repo, [_, b, _, _]) = repo();
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        let builds = vec![build(1, &b, "main", 0), build(2, &"0".repeat(40), "gone", 0)];

        let err = assemble_changed_files(
            &history,
            &FixtureBuildIndex::default(),
            &builds,
            &AncestorSearch::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DiffError::Vcs(VcsError::UnknownCommit { .. })));
    }

    #[test]
    fn no_baselines_means_no_changes() {
        let (repo, _) = repo();
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        let set = assemble_changed_files(
            &history,
            &FixtureBuildIndex::default(),
            &[],
            &AncestorSearch::default(),
        )
        .unwrap();
        assert_eq!(set, ChangedFileSet::default());
    }
}
