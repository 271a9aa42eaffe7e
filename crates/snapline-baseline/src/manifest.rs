//! Package manifest analysis: a changed `package.json` only invalidates
//! tracing when its dependency sections changed.

use serde_json::Value;
use snapline_core::types::PackageFileChange;
use snapline_vcs::CommitHistory;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const MANIFEST_FILE_NAME: &str = "package.json";

/// Sections whose contents change what gets installed.
const DEPENDENCY_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
    "bundledDependencies",
    "overrides",
    "resolutions",
];

pub fn is_package_manifest(path: &str) -> bool {
    path == MANIFEST_FILE_NAME
        || path
            .strip_suffix(MANIFEST_FILE_NAME)
            .is_some_and(|dir| dir.ends_with('/'))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAnalysis {
    /// Manifests whose dependency sections differ from at least one baseline.
    pub dependency_changes: Vec<String>,
    /// Manifests whose changes are confined to metadata (scripts, version, ...).
    pub metadata_only: Vec<String>,
}

/// Compare every changed manifest against the commit it was diffed from.
///
/// A manifest that cannot be read or parsed on either side counts as a
/// dependency change.
pub fn analyze_package_files(
    history: &dyn CommitHistory,
    changes: &[PackageFileChange],
) -> ManifestAnalysis {
    let mut changed = BTreeSet::new();
    let mut unchanged = BTreeSet::new();
    for change in changes {
        if dependencies_changed(history, change) {
            changed.insert(change.path.clone());
        } else {
            unchanged.insert(change.path.clone());
        }
    }
    ManifestAnalysis {
        metadata_only: unchanged.difference(&changed).cloned().collect(),
        dependency_changes: changed.into_iter().collect(),
    }
}

fn dependencies_changed(history: &dyn CommitHistory, change: &PackageFileChange) -> bool {
    let before = history.read_file_at(Some(&change.commit), &change.path);
    let after = history.read_file_at(None, &change.path);
    let (before, after) = match (before, after) {
        (Ok(Some(before)), Ok(Some(after))) => (before, after),
        (Ok(_), Ok(_)) => {
            debug!(path = %change.path, commit = %change.commit, "manifest added or removed");
            return true;
        }
        (Err(e), _) | (_, Err(e)) => {
            debug!(path = %change.path, commit = %change.commit, error = %e, "could not read manifest");
            return true;
        }
    };
    match (dependency_sections(&before), dependency_sections(&after)) {
        (Some(before), Some(after)) => before != after,
        _ => {
            debug!(path = %change.path, "manifest is not valid JSON");
            true
        }
    }
}

fn dependency_sections(raw: &str) -> Option<BTreeMap<&'static str, Value>> {
    let Value::Object(mut manifest) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };
    Some(
        DEPENDENCY_SECTIONS
            .iter()
            .filter_map(|section| Some((*section, manifest.remove(*section)?)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_vcs::Git2CommitHistory;
    use snapline_vcs::testing::TestRepo;

    const BASE: &str = r#"{"name":"app","version":"1.0.0","dependencies":{"react":"^18.0.0"}}"#;

    fn analyze(worktree: &str) -> ManifestAnalysis {
        let repo = TestRepo::new();
        let base = repo.commit("base", &[], &[("package.json", BASE)], 1_000);
        repo.checkout_branch("main", &base);
        repo.write_worktree_file("package.json", worktree);
        let history = Git2CommitHistory::open(repo.path()).unwrap();
        analyze_package_files(
            &history,
            &[PackageFileChange {
                path: "package.json".into(),
                commit: base,
            }],
        )
    }

    #[test]
    fn recognises_manifests_by_file_name() {
        assert!(is_package_manifest("package.json"));
        assert!(is_package_manifest("packages/ui/package.json"));
        assert!(!is_package_manifest("src/not-package.json"));
        assert!(!is_package_manifest("package.json5"));
    }

    #[test]
    fn version_bump_is_metadata_only() {
        let result = analyze(
            r#"{
  "name": "app",
  "version": "1.1.0",
  "dependencies": { "react": "^18.0.0" }
}"#,
        );
        assert_eq!(result.metadata_only, vec!["package.json"]);
        assert!(result.dependency_changes.is_empty());
    }

    #[test]
    fn dependency_edit_is_a_change() {
        let result = analyze(r#"{"name":"app","version":"1.0.0","dependencies":{"react":"^19.0.0"}}"#);
        assert_eq!(result.dependency_changes, vec!["package.json"]);
    }

    #[test]
    fn unparseable_manifest_is_a_change() {
        let result = analyze("{ not json");
        assert_eq!(result.dependency_changes, vec!["package.json"]);
    }

    #[test]
    fn any_baseline_with_a_dependency_change_wins() {
        let repo = TestRepo::new();
        let old = repo.commit(
            "old",
            &[],
            &[("package.json", r#"{"dependencies":{"react":"^17.0.0"}}"#)],
            1_000,
        );
        let new = repo.commit("new", &[&old], &[("package.json", BASE)], 2_000);
        repo.checkout_branch("main", &new);
        repo.write_worktree_file("package.json", &BASE.replace("1.0.0", "1.0.1"));
        let history = Git2CommitHistory::open(repo.path()).unwrap();

        let result = analyze_package_files(
            &history,
            &[
                PackageFileChange {
                    path: "package.json".into(),
                    commit: new,
                },
                PackageFileChange {
                    path: "package.json".into(),
                    commit: old,
                },
            ],
        );
        assert_eq!(result.dependency_changes, vec!["package.json"]);
        assert!(result.metadata_only.is_empty());
    }
}
