use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VcsError {
    #[error("not a git repository: {path}")]
    NotGitRepo { path: String },

    /// The object is not present in the local repository (git's "bad object"),
    /// usually because history was rewritten after the build was recorded.
    #[error("bad object: {commit}")]
    UnknownCommit { commit: String },

    #[error("git error: {0}")]
    GitError(String),
}

impl VcsError {
    /// For use with `.map_err(VcsError::git)` on libgit2 results.
    pub fn git<E: std::fmt::Display>(e: E) -> Self {
        Self::GitError(e.to_string())
    }

    pub fn unknown_commit(commit: impl Into<String>) -> Self {
        Self::UnknownCommit {
            commit: commit.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("missing project token: set {env}")]
    MissingToken { env: &'static str },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("index responded with http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("query failed: {message}")]
    Graphql { message: String, retryable: bool },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("index query failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<IndexError>,
    },
}

impl IndexError {
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    pub fn decode<E: std::fmt::Display>(e: E) -> Self {
        Self::Decode(e.to_string())
    }

    /// Failures that may clear up on their own (network, provider outages).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Graphql { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("stats file not found: {path}")]
    Missing { path: String },

    #[error("failed to parse stats file {path}: {reason}")]
    Parse { path: String, reason: String },
}
