//! Baseline selection: which earlier builds a new build is compared against,
//! and which files changed since them.

pub mod changeset;
pub mod error;
pub mod manifest;
pub mod resolver;
pub mod substitute;

pub use changeset::assemble_changed_files;
pub use error::{BaselineError, DiffError};
pub use manifest::{ManifestAnalysis, analyze_package_files, is_package_manifest};
pub use resolver::{ResolveOptions, resolve_parent_commits};
pub use substitute::{
    AncestorSearch, ChangedFilesWithReplacement, changed_files_with_replacement,
    find_ancestor_build_with_commit,
};
