//! Fixture repositories for tests: commits are written directly to the object
//! database with explicit parents and timestamps, so arbitrary DAG shapes
//! (merges, orphaned branches, skewed clocks) are easy to build.

use git2::build::CheckoutBuilder;
use git2::{Index, IndexEntry, IndexTime, Oid, Repository, Signature, Time};
use std::path::Path;
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let repo = Repository::init(dir.path()).expect("init repository");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a commit whose tree is the first parent's tree plus `files`.
    /// Returns the full hash. No ref is moved.
    pub fn commit(
        &self,
        message: &str,
        parents: &[&str],
        files: &[(&str, &str)],
        time_secs: i64,
    ) -> String {
        let parent_commits: Vec<_> = parents
            .iter()
            .map(|hash| {
                self.repo
                    .find_commit(Oid::from_str(hash).expect("parent hash"))
                    .expect("parent commit")
            })
            .collect();

        let mut index = Index::new().expect("in-memory index");
        if let Some(first) = parent_commits.first() {
            index
                .read_tree(&first.tree().expect("parent tree"))
                .expect("read parent tree");
        }
        for (path, contents) in files {
            let blob = self.repo.blob(contents.as_bytes()).expect("write blob");
            index.add(&index_entry(path, blob)).expect("stage file");
        }
        let tree_id = index.write_tree_to(&self.repo).expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("find tree");

        let sig = Signature::new("snapline", "ci@snapline.dev", &Time::new(time_secs, 0))
            .expect("signature");
        let parent_refs: Vec<_> = parent_commits.iter().collect();
        self.repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .expect("commit")
            .to_string()
    }

    /// Point `refs/heads/<branch>` at `commit`, make it HEAD and check it out.
    pub fn checkout_branch(&self, branch: &str, commit: &str) {
        let oid = Oid::from_str(commit).expect("commit hash");
        let ref_name = format!("refs/heads/{branch}");
        self.repo
            .reference(&ref_name, oid, true, "test checkout")
            .expect("update branch");
        self.repo.set_head(&ref_name).expect("set HEAD");
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force().remove_untracked(true)))
            .expect("checkout HEAD");
    }

    /// Detach HEAD at `commit` and check it out.
    pub fn checkout_detached(&self, commit: &str) {
        let oid = Oid::from_str(commit).expect("commit hash");
        self.repo.set_head_detached(oid).expect("detach HEAD");
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))
            .expect("checkout HEAD");
    }

    pub fn write_worktree_file(&self, path: &str, contents: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(full, contents).expect("write file");
    }
}

fn index_entry(path: &str, id: Oid) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: 0,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}
