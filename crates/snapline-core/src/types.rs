use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What the run knows about the checked-out commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit: String,
    pub branch: String,
    /// Committer timestamp in milliseconds since the epoch.
    pub committed_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Prepared,
    InProgress,
    Pending,
    Passed,
    Accepted,
    Denied,
    Broken,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Accepted => "accepted",
            Self::Denied => "denied",
            Self::Broken => "broken",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

/// A build recorded by the remote index. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    pub number: u64,
    pub commit: String,
    #[serde(default)]
    pub committed_at: Option<i64>,
    #[serde(default)]
    pub status: BuildStatus,
    #[serde(default)]
    pub uncommitted_hash: Option<String>,
    #[serde(default)]
    pub is_local_build: bool,
    #[serde(default)]
    pub branch: Option<String>,
}

impl Build {
    /// Built from a working tree with uncommitted changes; never a valid baseline.
    pub fn is_dirty(&self) -> bool {
        self.uncommitted_hash
            .as_deref()
            .is_some_and(|hash| !hash.is_empty())
    }
}

/// A changed `package.json` and the commit it was diffed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFileChange {
    pub path: String,
    pub commit: String,
}

/// Union of files changed since every baseline build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFileSet {
    /// Repository-relative POSIX paths, sorted and deduplicated.
    pub changed_files: Vec<String>,
    /// `(original build id, replacement build id)` for every substituted baseline.
    pub replacement_build_ids: Vec<(String, String)>,
    pub changed_package_files: Vec<PackageFileChange>,
}

/// Why change-impact tracing was abandoned for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BailReason {
    NoAncestorBuild,
    Rebuild,
    InvalidChangedFiles,
    MissingStatsFile,
    ChangedExternalFiles { paths: Vec<String> },
    ChangedPackageFiles { paths: Vec<String> },
    ChangedConfigOrStaticFile { path: String },
}

impl fmt::Display for BailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAncestorBuild => f.write_str("no ancestor build to compare against"),
            Self::Rebuild => f.write_str("this commit was already built"),
            Self::InvalidChangedFiles => f.write_str("changed files could not be determined"),
            Self::MissingStatsFile => f.write_str("module stats file is missing or unreadable"),
            Self::ChangedExternalFiles { paths } => {
                write!(f, "external files changed: {}", paths.join(", "))
            }
            Self::ChangedPackageFiles { paths } => {
                write!(f, "package files changed: {}", paths.join(", "))
            }
            Self::ChangedConfigOrStaticFile { path } => {
                write!(f, "configuration or static file changed: {path}")
            }
        }
    }
}

/// Result of tracing changed files through the module graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceOutcome {
    /// Affected spec module id → normalized spec file names.
    Affected {
        modules: BTreeMap<String, Vec<String>>,
    },
    Bailed {
        bail: BailReason,
    },
}

impl TraceOutcome {
    pub fn bailed(reason: BailReason) -> Self {
        Self::Bailed { bail: reason }
    }

    pub fn bail_reason(&self) -> Option<&BailReason> {
        match self {
            Self::Bailed { bail } => Some(bail),
            Self::Affected { .. } => None,
        }
    }

    pub fn affected(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Affected { modules } => Some(modules),
            Self::Bailed { .. } => None,
        }
    }
}
