use anyhow::{Context, Result};
use serde::Serialize;
use snapline_baseline::{ResolveOptions, resolve_parent_commits};
use snapline_core::config::Config;
use snapline_vcs::CommitHistory;
use std::path::Path;

#[derive(Debug, Serialize)]
struct BaselineReport {
    commit: String,
    branch: String,
    parent_commits: Vec<String>,
    baseline_builds: Vec<BaselineBuild>,
}

#[derive(Debug, Serialize)]
struct BaselineBuild {
    id: String,
    number: u64,
    commit: String,
    status: &'static str,
}

pub fn run(history: &dyn CommitHistory, config: &Config, index_fixture: Option<&Path>) -> Result<()> {
    let index = super::open_index(config, index_fixture)?;
    let git = history.head_info().context("failed to read HEAD")?;
    let parent_commits = resolve_parent_commits(
        history,
        index.as_ref(),
        &git,
        &ResolveOptions::from_config(&config.baseline),
    )?;
    let baseline_builds = index
        .baseline_builds_for(&git.branch, &parent_commits)?
        .into_iter()
        .map(|build| BaselineBuild {
            id: build.id,
            number: build.number,
            status: build.status.as_str(),
            commit: build.commit,
        })
        .collect();

    super::print_json(&BaselineReport {
        commit: git.commit,
        branch: git.branch,
        parent_commits,
        baseline_builds,
    })
}
