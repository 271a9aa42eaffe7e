use anyhow::{Context, Result};
use snapline_core::config::Config;
use snapline_trace::{Classifier, ImpactTracer, ModuleGraph, PathNormalizer, StatsDocument};
use snapline_vcs::CommitHistory;
use std::path::Path;

pub fn run(
    history: &dyn CommitHistory,
    config: &Config,
    stats_file: &Path,
    files: &[String],
) -> Result<()> {
    let doc = StatsDocument::load(stats_file)?;
    let normalizer = PathNormalizer::new(history.repository_root(), super::base_dir(&config.trace));
    let graph = ModuleGraph::from_stats(&doc, &normalizer, &config.trace.config_dir);
    let classifier = Classifier::from_config(&config.trace).context("invalid trace rules")?;
    let outcome = ImpactTracer::new(&graph, &normalizer, &classifier, &config.trace).trace(files);
    super::print_json(&outcome)
}
