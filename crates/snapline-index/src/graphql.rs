use crate::port::{BuildIndex, FirstAndLastBuild, MergedPullRequest};
use crate::queries::{self, AppData};
use crate::retry::{RetryPolicy, with_retries};
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use snapline_core::config::IndexConfig;
use snapline_core::constants::PROJECT_TOKEN_ENV;
use snapline_core::error::IndexError;
use snapline_core::types::Build;
use std::time::Duration;
use tracing::debug;

/// `BuildIndex` over the index's GraphQL endpoint.
pub struct GraphqlBuildIndex {
    endpoint: String,
    token: String,
    client: Client,
    retry: RetryPolicy,
}

impl GraphqlBuildIndex {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snapline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(IndexError::transport)?;
        Ok(Self {
            endpoint: endpoint.into(),
            token: token.into(),
            client,
            retry,
        })
    }

    /// Build a client from config, reading the project token from the environment.
    pub fn from_config(config: &IndexConfig) -> Result<Self, IndexError> {
        let token = std::env::var(PROJECT_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(IndexError::MissingToken {
                env: PROJECT_TOKEN_ENV,
            })?;
        Self::new(
            config.endpoint.clone(),
            token,
            Duration::from_millis(config.timeout_ms.max(1)),
            RetryPolicy::from_config(config),
        )
    }

    fn run_query<V, T>(&self, name: &str, query: &str, variables: &V) -> Result<T, IndexError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        with_retries(&self.retry, name, || {
            debug!(query = name, "sending index query");
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.token)
                .json(&json!({ "query": query, "variables": variables }))
                .send()
                .map_err(IndexError::transport)?;
            let status = response.status();
            let body = response.text().map_err(IndexError::transport)?;
            if !status.is_success() {
                return Err(IndexError::Status {
                    status: status.as_u16(),
                    body: truncate(&body, 512),
                });
            }
            queries::decode_response(&body)
        })
    }
}

impl BuildIndex for GraphqlBuildIndex {
    fn first_and_last_build(&self, branch: &str) -> Result<FirstAndLastBuild, IndexError> {
        let data: AppData<queries::FirstAndLastBuildApp> = self.run_query(
            "FirstAndLastBuild",
            queries::FIRST_AND_LAST_BUILD,
            &json!({ "branch": branch }),
        )?;
        Ok(FirstAndLastBuild {
            first_build: data.app.first_build,
            last_build_on_branch: data.app.last_build,
        })
    }

    fn has_builds_with_commits(&self, commits: &[String]) -> Result<Vec<String>, IndexError> {
        if commits.is_empty() {
            return Ok(Vec::new());
        }
        let data: AppData<queries::HasBuildsApp> = self.run_query(
            "HasBuildsWithCommits",
            queries::HAS_BUILDS_WITH_COMMITS,
            &json!({ "commits": commits }),
        )?;
        Ok(data.app.has_builds_with_commits)
    }

    fn merged_pull_requests_for(
        &self,
        commits: &[String],
        base_branch: &str,
    ) -> Result<Vec<MergedPullRequest>, IndexError> {
        if commits.is_empty() {
            return Ok(Vec::new());
        }
        let merge_info_list: Vec<_> = commits
            .iter()
            .map(|commit| json!({ "commit": commit, "baseRefName": base_branch }))
            .collect();
        let data: AppData<queries::MergedPullRequestsApp> = self.run_query(
            "MergedPullRequests",
            queries::MERGED_PULL_REQUESTS,
            &json!({ "mergeInfoList": merge_info_list }),
        )?;

        // Entries are positional: the n-th entry answers the n-th commit.
        Ok(commits
            .iter()
            .zip(data.app.merged_pull_requests)
            .filter_map(|(commit, entry)| {
                let head = entry?.last_head_build?;
                Some(MergedPullRequest {
                    commit: commit.clone(),
                    last_head_build_commit: head.commit,
                })
            })
            .collect())
    }

    fn ancestor_builds_of(
        &self,
        build_number: u64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Build>, IndexError> {
        let data: AppData<queries::AncestorBuildsApp> = self.run_query(
            "AncestorBuilds",
            &queries::ancestor_builds_query(),
            &json!({ "buildNumber": build_number, "skip": skip, "limit": limit }),
        )?;
        Ok(data
            .app
            .build
            .map(|build| build.ancestor_builds)
            .unwrap_or_default())
    }

    fn baseline_builds_for(
        &self,
        branch: &str,
        parent_commits: &[String],
    ) -> Result<Vec<Build>, IndexError> {
        if parent_commits.is_empty() {
            return Ok(Vec::new());
        }
        let data: AppData<queries::BaselineBuildsApp> = self.run_query(
            "BaselineBuilds",
            &queries::baseline_builds_query(),
            &json!({ "branch": branch, "parentCommits": parent_commits }),
        )?;
        Ok(data.app.baseline_builds)
    }

    fn build_for_commit(&self, commit: &str) -> Result<Option<Build>, IndexError> {
        let data: AppData<queries::BuildForCommitApp> = self.run_query(
            "BuildForCommit",
            &queries::build_for_commit_query(),
            &json!({ "commit": commit }),
        )?;
        Ok(data.app.last_build)
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
