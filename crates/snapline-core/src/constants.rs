/// Initial candidate window for the exponential commit search.
pub const INITIAL_COMMIT_LIMIT: usize = 20;

/// Page size used when walking a build's ancestor builds.
pub const ANCESTOR_PAGE_SIZE: usize = 10;

/// Maximum number of ancestor builds inspected before giving up.
pub const ANCESTOR_SEARCH_LIMIT: usize = 80;

/// Attempts made for a remote index query before the run fails.
pub const DEFAULT_INDEX_RETRIES: u32 = 5;

/// Base delay between index query attempts.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

/// Request timeout for index queries.
pub const DEFAULT_INDEX_TIMEOUT_MS: u64 = 30_000;

/// Default remote index endpoint.
pub const DEFAULT_INDEX_ENDPOINT: &str = "https://index.snapline.dev/graphql";

/// Environment variable carrying the project token.
pub const PROJECT_TOKEN_ENV: &str = "SNAPLINE_PROJECT_TOKEN";

/// Default Storybook configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = ".storybook";

/// Default data directory name under home.
pub const DEFAULT_DATA_DIR: &str = ".snapline";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = ".snapline/config.toml";

/// Branch name git reports for a detached HEAD.
pub const DETACHED_HEAD_BRANCH: &str = "HEAD";
