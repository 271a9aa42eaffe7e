//! GraphQL documents and response shapes for the build index.

use crate::port::{BranchBuild, FirstBuild};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use snapline_core::error::IndexError;
use snapline_core::types::Build;

const BUILD_FIELDS: &str =
    "id number commit committedAt status uncommittedHash isLocalBuild branch";

pub const FIRST_AND_LAST_BUILD: &str = r#"
query FirstAndLastBuild($branch: String!) {
  app {
    firstBuild { committedAt }
    lastBuild(branch: $branch) { commit committedAt }
  }
}"#;

pub const HAS_BUILDS_WITH_COMMITS: &str = r#"
query HasBuildsWithCommits($commits: [String!]!) {
  app {
    hasBuildsWithCommits(commits: $commits)
  }
}"#;

pub const MERGED_PULL_REQUESTS: &str = r#"
query MergedPullRequests($mergeInfoList: [MergedInfoInput!]!) {
  app {
    mergedPullRequests(mergeInfoList: $mergeInfoList) {
      lastHeadBuild { commit }
    }
  }
}"#;

pub fn ancestor_builds_query() -> String {
    format!(
        r#"
query AncestorBuilds($buildNumber: Int!, $skip: Int!, $limit: Int!) {{
  app {{
    build(number: $buildNumber) {{
      ancestorBuilds(skip: $skip, limit: $limit) {{ {BUILD_FIELDS} }}
    }}
  }}
}}"#
    )
}

pub fn baseline_builds_query() -> String {
    format!(
        r#"
query BaselineBuilds($branch: String!, $parentCommits: [String!]!) {{
  app {{
    baselineBuilds(branch: $branch, parentCommits: $parentCommits) {{ {BUILD_FIELDS} }}
  }}
}}"#
    )
}

pub fn build_for_commit_query() -> String {
    format!(
        r#"
query BuildForCommit($commit: String!) {{
  app {{
    lastBuild(commit: $commit) {{ {BUILD_FIELDS} }}
  }}
}}"#
    )
}

/// Error codes that retrying cannot fix.
const PERMANENT_ERROR_CODES: &[&str] = &["UNAUTHENTICATED", "FORBIDDEN", "BAD_USER_INPUT", "NOT_FOUND"];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
    #[serde(default)]
    extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorExtensions {
    code: Option<String>,
}

/// Unwrap a GraphQL response body into its `data`, turning `errors` into an
/// `IndexError::Graphql`. Errors are retryable unless every entry carries a
/// permanent error code.
pub fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T, IndexError> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(IndexError::decode)?;
    if !envelope.errors.is_empty() {
        let retryable = envelope.errors.iter().any(|entry| {
            entry
                .extensions
                .as_ref()
                .and_then(|ext| ext.code.as_deref())
                .is_none_or(|code| !PERMANENT_ERROR_CODES.contains(&code))
        });
        let message = envelope
            .errors
            .into_iter()
            .map(|entry| entry.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(IndexError::Graphql { message, retryable });
    }
    envelope
        .data
        .ok_or_else(|| IndexError::Decode("response has neither data nor errors".into()))
}

#[derive(Debug, Deserialize)]
pub struct AppData<T> {
    pub app: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstAndLastBuildApp {
    pub first_build: Option<FirstBuild>,
    pub last_build: Option<BranchBuild>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasBuildsApp {
    #[serde(default)]
    pub has_builds_with_commits: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPullRequestsApp {
    #[serde(default)]
    pub merged_pull_requests: Vec<Option<MergedPullRequestEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPullRequestEntry {
    pub last_head_build: Option<CommitOnly>,
}

#[derive(Debug, Deserialize)]
pub struct CommitOnly {
    pub commit: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorBuildsApp {
    pub build: Option<AncestorBuildsBuild>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorBuildsBuild {
    #[serde(default)]
    pub ancestor_builds: Vec<Build>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineBuildsApp {
    #[serde(default)]
    pub baseline_builds: Vec<Build>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildForCommitApp {
    pub last_build: Option<Build>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_payload() {
        let body = r#"{"data":{"app":{"firstBuild":{"committedAt":1000},"lastBuild":null}}}"#;
        let data: AppData<FirstAndLastBuildApp> = decode_response(body).unwrap();
        assert_eq!(data.app.first_build.unwrap().committed_at, Some(1000));
        assert!(data.app.last_build.is_none());
    }

    #[test]
    fn graphql_errors_are_retryable_by_default() {
        let body = r#"{"data":null,"errors":[{"message":"provider timeout"}]}"#;
        let err = decode_response::<AppData<HasBuildsApp>>(body).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "query failed: provider timeout");
    }

    #[test]
    fn permanent_error_codes_stop_retries() {
        let body = r#"{"errors":[{"message":"bad token","extensions":{"code":"UNAUTHENTICATED"}}]}"#;
        let err = decode_response::<AppData<HasBuildsApp>>(body).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = decode_response::<AppData<HasBuildsApp>>("<html>").unwrap_err();
        assert!(matches!(err, IndexError::Decode(_)));
    }

    #[test]
    fn build_queries_request_every_build_field() {
        for query in [
            ancestor_builds_query(),
            baseline_builds_query(),
            build_for_commit_query(),
        ] {
            assert!(query.contains("uncommittedHash isLocalBuild"));
        }
    }
}
