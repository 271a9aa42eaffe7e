pub mod git2_history;
pub mod history;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use git2_history::Git2CommitHistory;
pub use history::CommitHistory;
