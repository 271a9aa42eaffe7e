use crate::graph::{ModuleGraph, NodeIndex};
use crate::paths::PathNormalizer;
use crate::rules::{Classifier, FileClass};
use snapline_core::config::TraceConfig;
use snapline_core::types::{BailReason, TraceOutcome};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Traces changed files up the import graph to the spec globs they reach.
pub struct ImpactTracer<'a> {
    graph: &'a ModuleGraph,
    normalizer: &'a PathNormalizer,
    classifier: &'a Classifier,
    config_dir: String,
    static_dirs: Vec<String>,
}

/// Mutable state of one trace.
struct Walk {
    checked: Vec<bool>,
    to_check: Vec<NodeIndex>,
    affected: BTreeMap<String, Vec<String>>,
}

impl<'a> ImpactTracer<'a> {
    pub fn new(
        graph: &'a ModuleGraph,
        normalizer: &'a PathNormalizer,
        classifier: &'a Classifier,
        config: &TraceConfig,
    ) -> Self {
        Self {
            graph,
            normalizer,
            classifier,
            config_dir: normalizer.module_name(&config.config_dir),
            static_dirs: config
                .static_dirs
                .iter()
                .map(|dir| normalizer.module_name(dir))
                .collect(),
        }
    }

    /// Map each affected spec glob's module id to its name, or explain why the
    /// result cannot be trusted.
    ///
    /// The result does not depend on the order of `changed_files`.
    pub fn trace(&self, changed_files: &[String]) -> TraceOutcome {
        let mut package_files = Vec::new();
        let mut external_files = Vec::new();
        let mut traced = Vec::new();
        for file in changed_files {
            match self.classifier.classify(file) {
                FileClass::Untraced => debug!(path = %file, "ignoring untraced file"),
                FileClass::Global => package_files.push(file.clone()),
                FileClass::External => external_files.push(file.clone()),
                FileClass::Traced => traced.push(self.normalizer.changed_file(file)),
            }
        }

        if !package_files.is_empty() {
            package_files.sort();
            package_files.dedup();
            return self.bail(BailReason::ChangedPackageFiles {
                paths: package_files,
            });
        }
        if !external_files.is_empty() {
            external_files.sort();
            external_files.dedup();
            return self.bail(BailReason::ChangedExternalFiles {
                paths: external_files,
            });
        }
        if !self.graph.has_spec_globs() {
            warn!("stats file has no spec globs; no specs can be marked affected");
        }

        traced.sort();
        traced.dedup();
        let mut walk = Walk {
            checked: vec![false; self.graph.len()],
            to_check: Vec::new(),
            affected: BTreeMap::new(),
        };
        for name in &traced {
            if let Err(reason) = self.visit(name, &mut walk) {
                return self.bail(reason);
            }
        }
        while let Some(idx) = walk.to_check.pop() {
            for importer in &self.graph.node(idx).reasons {
                if self.classifier.is_untraced(importer) {
                    continue;
                }
                if let Err(reason) = self.visit(importer, &mut walk) {
                    return self.bail(reason);
                }
            }
        }

        debug!(
            changed = traced.len(),
            checked = walk.checked.iter().filter(|c| **c).count(),
            affected = walk.affected.len(),
            "traced changed files"
        );
        TraceOutcome::Affected {
            modules: walk.affected,
        }
    }

    fn visit(&self, name: &str, walk: &mut Walk) -> Result<(), BailReason> {
        let idx = self.graph.lookup(name);
        if let Some(idx) = idx
            && self.graph.is_spec_glob_node(idx)
        {
            let node = self.graph.node(idx);
            walk.affected
                .entry(node.id.clone())
                .or_insert_with(|| vec![node.name.clone()]);
            return Ok(());
        }
        if self.is_config_or_static(name) {
            return Err(BailReason::ChangedConfigOrStaticFile {
                path: name.to_string(),
            });
        }
        if let Some(idx) = idx
            && !walk.checked[idx.0]
        {
            walk.checked[idx.0] = true;
            walk.to_check.push(idx);
        }
        Ok(())
    }

    fn is_config_or_static(&self, name: &str) -> bool {
        let under = |dir: &str| {
            name.strip_prefix(dir)
                .is_some_and(|rest| rest.starts_with('/'))
        };
        (under(&self.config_dir) && !self.graph.is_stories_entry_file(name))
            || self.static_dirs.iter().any(|dir| under(dir))
    }

    fn bail(&self, reason: BailReason) -> TraceOutcome {
        warn!(reason = %reason, "disabling change-impact tracing for this run");
        TraceOutcome::bailed(reason)
    }
}
