use anyhow::{Context, Result};
use serde::Serialize;
use snapline_baseline::{
    AncestorSearch, ResolveOptions, analyze_package_files, assemble_changed_files,
    resolve_parent_commits,
};
use snapline_core::config::Config;
use snapline_core::types::{BailReason, GitInfo, TraceOutcome};
use snapline_index::BuildIndex;
use snapline_trace::{Classifier, ImpactTracer, ModuleGraph, PathNormalizer, StatsDocument};
use snapline_vcs::CommitHistory;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub commit: String,
    pub branch: String,
    pub parent_commits: Vec<String>,
    pub baseline_build_ids: Vec<String>,
    pub changed_files: Vec<String>,
    pub replacement_build_ids: Vec<(String, String)>,
    pub outcome: TraceOutcome,
}

impl PlanReport {
    fn new(git: &GitInfo) -> Self {
        Self {
            commit: git.commit.clone(),
            branch: git.branch.clone(),
            parent_commits: Vec::new(),
            baseline_build_ids: Vec::new(),
            changed_files: Vec::new(),
            replacement_build_ids: Vec::new(),
            outcome: TraceOutcome::Affected {
                modules: BTreeMap::new(),
            },
        }
    }

    fn bail(mut self, reason: BailReason) -> Self {
        warn!(reason = %reason, "change-impact tracing disabled");
        self.outcome = TraceOutcome::bailed(reason);
        self
    }
}

pub fn run(
    history: &dyn CommitHistory,
    config: &Config,
    stats_file: &Path,
    index_fixture: Option<&Path>,
) -> Result<()> {
    let index = super::open_index(config, index_fixture)?;
    let report = build_plan(history, index.as_ref(), config, stats_file)?;
    super::print_json(&report)
}

/// Baselines, changed files and affected stories for HEAD.
///
/// Remote and repository failures are errors. Anything that only makes the
/// trace untrustworthy ends the plan early with a bail reason.
pub fn build_plan(
    history: &dyn CommitHistory,
    index: &dyn BuildIndex,
    config: &Config,
    stats_file: &Path,
) -> Result<PlanReport> {
    let git = history.head_info().context("failed to read HEAD")?;
    let mut report = PlanReport::new(&git);

    if let Some(existing) = index.build_for_commit(&git.commit)?
        && !existing.is_dirty()
    {
        info!(build = existing.number, "commit already has a build");
        return Ok(report.bail(BailReason::Rebuild));
    }

    report.parent_commits = resolve_parent_commits(
        history,
        index,
        &git,
        &ResolveOptions::from_config(&config.baseline),
    )?;
    let baselines = index.baseline_builds_for(&git.branch, &report.parent_commits)?;
    report.baseline_build_ids = baselines.iter().map(|build| build.id.clone()).collect();
    if baselines.is_empty() {
        return Ok(report.bail(BailReason::NoAncestorBuild));
    }

    let changes = match assemble_changed_files(
        history,
        index,
        &baselines,
        &AncestorSearch::from_config(&config.baseline),
    ) {
        Ok(changes) => changes,
        Err(e) => {
            warn!(error = %e, "could not determine changed files");
            return Ok(report.bail(BailReason::InvalidChangedFiles));
        }
    };
    report.changed_files = changes.changed_files.clone();
    report.replacement_build_ids = changes.replacement_build_ids.clone();

    let manifests = analyze_package_files(history, &changes.changed_package_files);
    if !manifests.dependency_changes.is_empty() {
        return Ok(report.bail(BailReason::ChangedPackageFiles {
            paths: manifests.dependency_changes,
        }));
    }
    let trace_input: Vec<String> = changes
        .changed_files
        .into_iter()
        .filter(|file| !manifests.metadata_only.contains(file))
        .collect();

    let doc = match StatsDocument::load(stats_file) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "cannot trace without a stats file");
            return Ok(report.bail(BailReason::MissingStatsFile));
        }
    };
    let normalizer = PathNormalizer::new(history.repository_root(), super::base_dir(&config.trace));
    let graph = ModuleGraph::from_stats(&doc, &normalizer, &config.trace.config_dir);
    let classifier = Classifier::from_config(&config.trace).context("invalid trace rules")?;
    report.outcome = ImpactTracer::new(&graph, &normalizer, &classifier, &config.trace).trace(&trace_input);
    if let Some(modules) = report.outcome.affected() {
        info!(
            changed = trace_input.len(),
            affected = modules.len(),
            "traced changed files"
        );
    }
    Ok(report)
}
