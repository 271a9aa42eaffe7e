use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Module names produced by bundler plugins rather than files on disk.
pub const VIRTUAL_PREFIX: &str = "/virtual:";

static CONCATENATION_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" \+ \d+ modules$").expect("concatenation suffix regex must compile")
});

/// Maps bundler module names and changed-file paths onto one namespace:
/// repository-relative POSIX paths written as `./dir/file.js`.
///
/// Module names are relative to the bundler's base directory; changed files
/// are relative to the repository root. Virtual names pass through untouched.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    repo_root: String,
    base_dir: String,
}

impl PathNormalizer {
    /// `base_dir` is the repository-relative directory the bundler ran in.
    pub fn new(repo_root: &Path, base_dir: &str) -> Self {
        let repo_root = repo_root
            .to_string_lossy()
            .replace('\\', "/")
            .trim_end_matches('/')
            .to_string();
        Self {
            repo_root,
            base_dir: lexical_clean(&base_dir.replace('\\', "/")),
        }
    }

    pub fn module_name(&self, raw: &str) -> String {
        let name = strip_concatenation_suffix(raw.trim()).replace('\\', "/");
        if name.starts_with(VIRTUAL_PREFIX) {
            return name;
        }
        if name.starts_with('/') {
            return match name
                .strip_prefix(&self.repo_root)
                .and_then(|rest| rest.strip_prefix('/'))
            {
                Some(relative) => render(&lexical_clean(relative)),
                // Outside the repository: nothing in history can match it.
                None => name,
            };
        }
        render(&lexical_clean(&format!("{}/{name}", self.base_dir)))
    }

    pub fn changed_file(&self, path: &str) -> String {
        render(&lexical_clean(&path.replace('\\', "/")))
    }
}

/// Drop the ` + N modules` marker bundlers append to concatenated modules.
pub fn strip_concatenation_suffix(name: &str) -> &str {
    match CONCATENATION_SUFFIX_RE.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Resolve `.` and `..` segments without touching the filesystem.
fn lexical_clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn render(relative: &str) -> String {
    if relative.starts_with("..") {
        relative.to_string()
    } else {
        format!("./{relative}")
    }
}
