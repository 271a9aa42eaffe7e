//! Classification of changed files and module names.
//!
//! Both classifications are plain rule tables evaluated once per path, so the
//! taxonomy can be read and tested apart from the traversal.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::RegexSet;
use snapline_core::config::TraceConfig;
use snapline_core::error::ConfigError;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Follow through the module graph.
    Traced,
    /// Ignored entirely.
    Untraced,
    /// Package manifests, lockfiles and installed packages. Can change any
    /// module without the stats file showing it.
    Global,
    /// Used by the build outside the bundler's view.
    External,
}

/// Changed files that affect the whole dependency graph.
const GLOBAL_PATTERNS: &[&str] = &[
    "**/package.json",
    "**/package-lock.json",
    "**/npm-shrinkwrap.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/node_modules/**",
    "**/.yarn/**",
];

/// Module names that are bundler runtime or third-party code, never user code.
const BUNDLER_INTERNAL_PATTERNS: &[&str] = &[r"(^|/)node_modules/", r"/webpack/runtime/", r"^\(webpack\)"];

static BUNDLER_INTERNAL_RE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(BUNDLER_INTERNAL_PATTERNS).expect("bundler internal patterns must compile")
});

pub fn is_bundler_internal(module_name: &str) -> bool {
    BUNDLER_INTERNAL_RE.is_match(module_name)
}

struct Rule {
    matcher: GlobSet,
    class: FileClass,
}

/// Ordered rules; the first match decides.
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(untraced: &[String], externals: &[String]) -> Result<Self, ConfigError> {
        let global: Vec<String> = GLOBAL_PATTERNS.iter().map(|p| p.to_string()).collect();
        Ok(Self {
            rules: vec![
                Rule {
                    matcher: build_globset("trace.untraced", untraced)?,
                    class: FileClass::Untraced,
                },
                Rule {
                    matcher: build_globset("global", &global)?,
                    class: FileClass::Global,
                },
                Rule {
                    matcher: build_globset("trace.externals", externals)?,
                    class: FileClass::External,
                },
            ],
        })
    }

    pub fn from_config(config: &TraceConfig) -> Result<Self, ConfigError> {
        Self::new(&config.untraced, &config.externals)
    }

    /// Classify a repository-relative path. A leading `./` is ignored.
    pub fn classify(&self, path: &str) -> FileClass {
        let path = path.strip_prefix("./").unwrap_or(path);
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(path))
            .map_or(FileClass::Traced, |rule| rule.class)
    }

    pub fn is_untraced(&self, path: &str) -> bool {
        self.classify(path) == FileClass::Untraced
    }
}

fn build_globset(field: &str, patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::invalid(field, format!("`{pattern}`: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}
