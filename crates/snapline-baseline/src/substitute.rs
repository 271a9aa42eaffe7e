use crate::error::DiffError;
use snapline_core::config::BaselineConfig;
use snapline_core::constants::{ANCESTOR_PAGE_SIZE, ANCESTOR_SEARCH_LIMIT};
use snapline_core::error::IndexError;
use snapline_core::types::Build;
use snapline_index::BuildIndex;
use snapline_vcs::CommitHistory;
use tracing::debug;

/// Paging for the ancestor-build walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorSearch {
    pub page: usize,
    /// Ancestors examined before giving up.
    pub limit: usize,
}

impl Default for AncestorSearch {
    fn default() -> Self {
        Self {
            page: ANCESTOR_PAGE_SIZE,
            limit: ANCESTOR_SEARCH_LIMIT,
        }
    }
}

impl AncestorSearch {
    pub fn from_config(config: &BaselineConfig) -> Self {
        Self {
            page: config.ancestor_page_size,
            limit: config.ancestor_search_limit,
        }
    }
}

/// The nearest ancestor build of `build_number` whose commit exists locally
/// and which was built from a clean tree.
pub fn find_ancestor_build_with_commit(
    history: &dyn CommitHistory,
    index: &dyn BuildIndex,
    build_number: u64,
    search: &AncestorSearch,
) -> Result<Option<Build>, IndexError> {
    let page = search.page.max(1);
    let mut skip = 0;
    while skip < search.limit {
        let take = page.min(search.limit - skip);
        let builds = index.ancestor_builds_of(build_number, skip, take)?;
        if let Some(found) = builds
            .iter()
            .find(|build| !build.is_dirty() && history.commit_exists(&build.commit))
        {
            return Ok(Some(found.clone()));
        }
        if builds.len() < take {
            break;
        }
        skip += take;
    }
    Ok(None)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFilesWithReplacement {
    pub changed_files: Vec<String>,
    /// Set when the baseline's own commit could not be diffed against.
    pub replacement_build: Option<Build>,
}

/// Files changed between `build` and the working tree. When the build's
/// commit is missing locally or the build was dirty, diff against the nearest
/// usable ancestor build instead; if there is none, the original error stands.
pub fn changed_files_with_replacement(
    history: &dyn CommitHistory,
    index: &dyn BuildIndex,
    build: &Build,
    search: &AncestorSearch,
) -> Result<ChangedFilesWithReplacement, DiffError> {
    let err = match changed_files_since(history, build) {
        Ok(changed_files) => {
            return Ok(ChangedFilesWithReplacement {
                changed_files,
                replacement_build: None,
            });
        }
        Err(err) if err.is_substitutable() => err,
        Err(err) => return Err(err),
    };

    debug!(build = build.number, commit = %build.commit, reason = %err, "baseline unusable; looking for an ancestor build");
    let Some(replacement) = find_ancestor_build_with_commit(history, index, build.number, search)?
    else {
        debug!(build = build.number, "no usable ancestor build");
        return Err(err);
    };

    debug!(build = build.number, replacement = replacement.number, commit = %replacement.commit, "diffing against replacement build");
    let changed_files = history.diff_name_only(&replacement.commit, None)?;
    Ok(ChangedFilesWithReplacement {
        changed_files,
        replacement_build: Some(replacement),
    })
}

fn changed_files_since(history: &dyn CommitHistory, build: &Build) -> Result<Vec<String>, DiffError> {
    if build.is_dirty() {
        return Err(DiffError::UncommittedBuild {
            number: build.number,
        });
    }
    Ok(history.diff_name_only(&build.commit, None)?)
}
