//! Change-impact tracing over a bundler's module-stats document.

pub mod graph;
pub mod paths;
pub mod rules;
pub mod stats;
pub mod tracer;

pub use graph::{ModuleGraph, ModuleNode, NodeIndex};
pub use paths::PathNormalizer;
pub use rules::{Classifier, FileClass};
pub use stats::StatsDocument;
pub use tracer::ImpactTracer;
