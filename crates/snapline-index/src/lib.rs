pub mod fixture;
pub mod graphql;
pub mod port;
pub mod queries;
pub mod retry;

pub use fixture::FixtureBuildIndex;
pub use graphql::GraphqlBuildIndex;
pub use port::{BranchBuild, BuildIndex, FirstAndLastBuild, FirstBuild, MergedPullRequest};
pub use retry::RetryPolicy;
