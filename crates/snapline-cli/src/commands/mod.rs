pub mod baselines;
pub mod plan;
pub mod trace;

use anyhow::{Context, Result};
use snapline_core::config::{Config, TraceConfig};
use snapline_index::{BuildIndex, FixtureBuildIndex, GraphqlBuildIndex};
use std::path::Path;

/// Where `build-storybook --stats-json` writes the preview stats.
pub const DEFAULT_STATS_FILE: &str = "storybook-static/preview-stats.json";

/// The remote index, or a recorded snapshot of it when `fixture` is given.
pub fn open_index(config: &Config, fixture: Option<&Path>) -> Result<Box<dyn BuildIndex>> {
    match fixture {
        Some(path) => {
            let index = FixtureBuildIndex::load(path)
                .with_context(|| format!("failed to load index fixture {}", path.display()))?;
            Ok(Box::new(index))
        }
        None => Ok(Box::new(GraphqlBuildIndex::from_config(&config.index)?)),
    }
}

pub fn base_dir(config: &TraceConfig) -> &str {
    config.base_dir.as_deref().unwrap_or("")
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
