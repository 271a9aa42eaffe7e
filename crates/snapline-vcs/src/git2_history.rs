use crate::history::CommitHistory;
use git2::{Commit, DiffOptions, ErrorCode, Oid, Repository, Sort};
use snapline_core::constants::DETACHED_HEAD_BRANCH;
use snapline_core::error::VcsError;
use snapline_core::types::GitInfo;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `CommitHistory` backed by libgit2. The repository is reopened per call so
/// the adapter stays `Send + Sync` and can be shared across diff workers.
#[derive(Debug, Clone)]
pub struct Git2CommitHistory {
    repo_root: PathBuf,
}

impl Git2CommitHistory {
    /// Open the repository containing `path` and remember its working-tree root.
    pub fn open(path: &Path) -> Result<Self, VcsError> {
        let repo = Repository::discover(path).map_err(|_| VcsError::NotGitRepo {
            path: path.display().to_string(),
        })?;
        let repo_root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::GitError("bare repositories are not supported".into()))?;
        Ok(Self { repo_root })
    }

    fn open_repo(&self) -> Result<Repository, VcsError> {
        Repository::open(&self.repo_root).map_err(|_| VcsError::NotGitRepo {
            path: self.repo_root.display().to_string(),
        })
    }

    fn find_commit<'r>(repo: &'r Repository, rev: &str) -> Result<Commit<'r>, VcsError> {
        let object = repo.revparse_single(rev).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
                VcsError::unknown_commit(rev)
            }
            _ => VcsError::GitError(format!("failed to resolve revision `{rev}`: {e}")),
        })?;
        object
            .peel_to_commit()
            .map_err(|e| VcsError::GitError(format!("`{rev}` is not a commit: {e}")))
    }
}

impl CommitHistory for Git2CommitHistory {
    fn repository_root(&self) -> &Path {
        &self.repo_root
    }

    fn head_info(&self) -> Result<GitInfo, VcsError> {
        let repo = self.open_repo()?;
        let head = repo
            .head()
            .map_err(|e| VcsError::GitError(format!("failed to read HEAD: {e}")))?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| VcsError::GitError(format!("failed to resolve HEAD commit: {e}")))?;
        let branch = if head.is_branch() {
            head.shorthand().unwrap_or(DETACHED_HEAD_BRANCH).to_string()
        } else {
            DETACHED_HEAD_BRANCH.to_string()
        };
        Ok(GitInfo {
            commit: commit.id().to_string(),
            branch,
            committed_at: commit.time().seconds() * 1000,
        })
    }

    fn list_commits_since(
        &self,
        since_secs: Option<i64>,
        limit: usize,
        excluding: &[String],
    ) -> Result<Vec<String>, VcsError> {
        let repo = self.open_repo()?;
        let mut walk = repo.revwalk().map_err(VcsError::git)?;
        walk.set_sorting(Sort::TIME).map_err(VcsError::git)?;
        walk.push_head()
            .map_err(|e| VcsError::GitError(format!("failed to walk from HEAD: {e}")))?;

        for hash in excluding {
            match Self::find_commit(&repo, hash) {
                Ok(commit) => walk.hide(commit.id()).map_err(VcsError::git)?,
                Err(e) => debug!(commit = %hash, error = %e, "skipping unknown commit in exclusion list"),
            }
        }

        let mut commits = Vec::new();
        for oid in walk {
            if commits.len() >= limit {
                break;
            }
            let oid = oid.map_err(VcsError::git)?;
            if let Some(since) = since_secs {
                let commit = repo.find_commit(oid).map_err(VcsError::git)?;
                // Time-sorted walk: everything after the first older commit is older too.
                if commit.time().seconds() < since {
                    break;
                }
            }
            commits.push(oid.to_string());
        }
        Ok(commits)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, VcsError> {
        let repo = self.open_repo()?;
        let a = Self::find_commit(&repo, a)?.id();
        let b = Self::find_commit(&repo, b)?.id();
        match repo.merge_base(a, b) {
            Ok(oid) => Ok(Some(oid.to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(VcsError::GitError(format!(
                "failed to compute merge base: {e}"
            ))),
        }
    }

    fn diff_name_only(&self, base: &str, head: Option<&str>) -> Result<Vec<String>, VcsError> {
        let repo = self.open_repo()?;
        let base_tree = Self::find_commit(&repo, base)?
            .tree()
            .map_err(|e| VcsError::GitError(format!("failed to load base tree: {e}")))?;

        let mut opts = DiffOptions::new();
        opts.include_typechange(true).include_untracked(false);
        let diff = match head {
            Some(head) => {
                let head_tree = Self::find_commit(&repo, head)?
                    .tree()
                    .map_err(|e| VcsError::GitError(format!("failed to load head tree: {e}")))?;
                repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))
            }
            None => repo.diff_tree_to_workdir_with_index(Some(&base_tree), Some(&mut opts)),
        }
        .map_err(|e| VcsError::GitError(format!("failed to compute diff: {e}")))?;

        let mut paths = BTreeSet::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path() {
                    paths.insert(path.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(paths.into_iter().collect())
    }

    fn commit_exists(&self, commit: &str) -> bool {
        let Ok(repo) = self.open_repo() else {
            return false;
        };
        // Only full object ids count; branch names and abbreviations do not.
        let Ok(oid) = Oid::from_str(commit) else {
            return false;
        };
        commit.len() == 40 && repo.find_commit(oid).is_ok()
    }

    fn maximally_descendant(&self, commits: &[String]) -> Result<Vec<String>, VcsError> {
        if commits.is_empty() {
            return Ok(Vec::new());
        }
        let repo = self.open_repo()?;
        let mut walk = repo.revwalk().map_err(VcsError::git)?;
        walk.set_sorting(Sort::TIME).map_err(VcsError::git)?;

        let mut members = Vec::with_capacity(commits.len());
        for hash in commits {
            let commit = Self::find_commit(&repo, hash)?;
            walk.push(commit.id()).map_err(VcsError::git)?;
            members.push(commit);
        }
        // Equivalent of `git rev-list <commits> --not <commits>^@`.
        for commit in &members {
            for parent in commit.parent_ids() {
                if let Err(e) = walk.hide(parent) {
                    debug!(parent = %parent, error = %e, "parent missing locally; not hidden");
                }
            }
        }

        walk.map(|oid| oid.map(|oid| oid.to_string()).map_err(VcsError::git))
            .collect()
    }

    fn read_file_at(&self, commit: Option<&str>, path: &str) -> Result<Option<String>, VcsError> {
        let Some(commit) = commit else {
            return match std::fs::read(self.repo_root.join(path)) {
                Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(VcsError::GitError(format!("failed to read {path}: {e}"))),
            };
        };

        let repo = self.open_repo()?;
        let tree = Self::find_commit(&repo, commit)?
            .tree()
            .map_err(VcsError::git)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(VcsError::git(e)),
        };
        let object = entry.to_object(&repo).map_err(VcsError::git)?;
        let Some(blob) = object.as_blob() else {
            return Ok(None);
        };
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }
}
