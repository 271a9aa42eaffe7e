use crate::constants;
use crate::error::ConfigError;
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after a transient failure; each query is tried `retries + 1` times.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default = "default_initial_limit")]
    pub initial_limit: usize,
    #[serde(default)]
    pub ignore_last_build_on_branch: bool,
    #[serde(default = "default_ancestor_page_size")]
    pub ancestor_page_size: usize,
    #[serde(default = "default_ancestor_search_limit")]
    pub ancestor_search_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Repository-relative directory the bundler resolves module names against.
    /// Defaults to the working directory relative to the repository root.
    #[serde(default)]
    pub base_dir: Option<String>,
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    #[serde(default)]
    pub static_dirs: Vec<String>,
    /// Globs for changed files that are ignored entirely.
    #[serde(default)]
    pub untraced: Vec<String>,
    /// Globs for files the bundler cannot see; a change to one disables tracing.
    #[serde(default)]
    pub externals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_endpoint() -> String {
    constants::DEFAULT_INDEX_ENDPOINT.into()
}
fn default_timeout_ms() -> u64 {
    constants::DEFAULT_INDEX_TIMEOUT_MS
}
fn default_retries() -> u32 {
    constants::DEFAULT_INDEX_RETRIES
}
fn default_retry_backoff_ms() -> u64 {
    constants::DEFAULT_RETRY_BACKOFF_MS
}
fn default_initial_limit() -> usize {
    constants::INITIAL_COMMIT_LIMIT
}
fn default_ancestor_page_size() -> usize {
    constants::ANCESTOR_PAGE_SIZE
}
fn default_ancestor_search_limit() -> usize {
    constants::ANCESTOR_SEARCH_LIMIT
}
fn default_config_dir() -> String {
    constants::DEFAULT_CONFIG_DIR.into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            initial_limit: default_initial_limit(),
            ignore_last_build_on_branch: false,
            ancestor_page_size: default_ancestor_page_size(),
            ancestor_search_limit: default_ancestor_search_limit(),
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            config_dir: default_config_dir(),
            static_dirs: Vec::new(),
            untraced: Vec::new(),
            externals: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with layered precedence:
    /// 1. Environment variables (`SNAPLINE_<SECTION>_<KEY>`, highest priority)
    /// 2. Explicit config file (from `--config`)
    /// 3. Project config: `<repo_root>/.snapline/config.toml`
    /// 4. Global config: `~/.snapline/config.toml`
    /// 5. Built-in defaults (lowest priority)
    pub fn load(repo_root: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_file(repo_root, None)
    }

    pub fn load_with_file(
        repo_root: Option<&Path>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let global = dirs::home_dir().map(|home| {
            home.join(constants::DEFAULT_DATA_DIR)
                .join("config.toml")
        });
        let project = repo_root.map(|root| root.join(constants::PROJECT_CONFIG_FILE));

        let mut merged = toml::Value::Table(toml::map::Map::new());
        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                let raw = load_toml_value(&path)?;
                merge_toml_values(&mut merged, &raw);
            }
        }

        if let Some(cf) = config_file {
            if !cf.exists() {
                return Err(ConfigError::NotFound {
                    path: cf.display().to_string(),
                });
            }
            let raw = load_toml_value(cf)?;
            merge_toml_values(&mut merged, &raw);
        }

        // Deserialize the merged value; fields no layer set fall back to defaults.
        let mut config =
            Config::deserialize(merged).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline.initial_limit == 0 {
            return Err(ConfigError::invalid(
                "baseline.initial_limit",
                "must be at least 1",
            ));
        }
        if self.baseline.ancestor_page_size == 0 {
            return Err(ConfigError::invalid(
                "baseline.ancestor_page_size",
                "must be at least 1",
            ));
        }
        for (field, patterns) in [
            ("trace.untraced", &self.trace.untraced),
            ("trace.externals", &self.trace.externals),
        ] {
            for pattern in patterns {
                Glob::new(pattern)
                    .map_err(|e| ConfigError::invalid(field, format!("`{pattern}`: {e}")))?;
            }
        }
        Ok(())
    }
}

fn load_toml_value(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    content
        .parse::<toml::Value>()
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
}

/// Deep-merge `overlay` into `base`. Only keys present in `overlay` are written.
fn merge_toml_values(base: &mut toml::Value, overlay: &toml::Value) {
    if let (toml::Value::Table(base_map), toml::Value::Table(overlay_map)) = (base, overlay) {
        for (key, overlay_val) in overlay_map {
            if let Some(base_val) = base_map.get_mut(key) {
                if base_val.is_table() && overlay_val.is_table() {
                    merge_toml_values(base_val, overlay_val);
                } else {
                    *base_val = overlay_val.clone();
                }
            } else {
                base_map.insert(key.clone(), overlay_val.clone());
            }
        }
    }
}

/// Convention: `SNAPLINE_<SECTION>_<KEY>` in UPPER_SNAKE_CASE. List values are
/// comma separated.
fn parse_env_number<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric environment override");
            None
        }
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SNAPLINE_INDEX_ENDPOINT") {
        config.index.endpoint = v;
    }
    if let Some(n) = parse_env_number(&var, "SNAPLINE_INDEX_TIMEOUT_MS") {
        config.index.timeout_ms = n;
    }
    if let Some(n) = parse_env_number(&var, "SNAPLINE_INDEX_RETRIES") {
        config.index.retries = n;
    }
    if let Some(n) = parse_env_number(&var, "SNAPLINE_INDEX_RETRY_BACKOFF_MS") {
        config.index.retry_backoff_ms = n;
    }
    if let Some(n) = parse_env_number(&var, "SNAPLINE_BASELINE_INITIAL_LIMIT") {
        config.baseline.initial_limit = n;
    }
    if let Some(v) = var("SNAPLINE_BASELINE_IGNORE_LAST_BUILD_ON_BRANCH") {
        config.baseline.ignore_last_build_on_branch = v == "true" || v == "1";
    }
    if let Some(v) = var("SNAPLINE_TRACE_BASE_DIR") {
        config.trace.base_dir = Some(v);
    }
    if let Some(v) = var("SNAPLINE_TRACE_CONFIG_DIR") {
        config.trace.config_dir = v;
    }
    if let Some(v) = var("SNAPLINE_TRACE_STATIC_DIRS") {
        config.trace.static_dirs = split_list(&v);
    }
    if let Some(v) = var("SNAPLINE_TRACE_UNTRACED") {
        config.trace.untraced = split_list(&v);
    }
    if let Some(v) = var("SNAPLINE_TRACE_EXTERNALS") {
        config.trace.externals = split_list(&v);
    }
    if let Some(v) = var("SNAPLINE_LOGGING_LEVEL") {
        config.logging.level = v;
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
