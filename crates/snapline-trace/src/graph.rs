use crate::paths::PathNormalizer;
use crate::rules::is_bundler_internal;
use crate::stats::StatsDocument;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub usize);

#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Bundler module id, rendered as a string.
    pub id: String,
    pub name: String,
    /// Normalized names of the modules importing this one.
    pub reasons: Vec<String>,
}

/// Immutable import graph built from one stats document.
///
/// Edges point from a module to its importers, which is the direction change
/// impact flows.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    ids_by_name: HashMap<String, NodeIndex>,
    /// Nodes imported directly by a stories-entry file.
    spec_globs: HashSet<NodeIndex>,
    stories_entry_files: HashSet<String>,
}

/// Generated modules that import every spec glob of a Storybook project.
pub fn stories_entry_files(normalizer: &PathNormalizer, config_dir: &str) -> HashSet<String> {
    [
        normalizer.module_name(&format!("{config_dir}/generated-stories-entry.js")),
        normalizer.module_name(&format!("{config_dir}/storybook-stories.js")),
        normalizer.module_name("./storybook-stories.js"),
        "/virtual:/@storybook/builder-vite/storybook-stories.js".to_string(),
        "/virtual:/@storybook/builder-vite/vite-app.js".to_string(),
    ]
    .into_iter()
    .collect()
}

impl ModuleGraph {
    pub fn from_stats(doc: &StatsDocument, normalizer: &PathNormalizer, config_dir: &str) -> Self {
        let mut graph = Self {
            stories_entry_files: stories_entry_files(normalizer, config_dir),
            ..Self::default()
        };
        let mut index_by_id: HashMap<String, NodeIndex> = HashMap::new();
        let mut skipped = 0usize;

        for module in &doc.modules {
            let Some(id) = &module.id else {
                skipped += 1;
                continue;
            };
            if is_bundler_internal(&module.name) {
                skipped += 1;
                continue;
            }
            let id = id.to_string();
            let name = normalizer.module_name(&module.name);

            let idx = *index_by_id.entry(id.clone()).or_insert_with(|| {
                graph.nodes.push(ModuleNode {
                    id,
                    name: name.clone(),
                    reasons: Vec::new(),
                });
                NodeIndex(graph.nodes.len() - 1)
            });

            graph.ids_by_name.insert(name.clone(), idx);
            for inner in &module.modules {
                graph
                    .ids_by_name
                    .entry(normalizer.module_name(&inner.name))
                    .or_insert(idx);
            }

            for reason in &module.reasons {
                let Some(importer) = reason.module_name.as_deref() else {
                    continue;
                };
                if is_bundler_internal(importer) {
                    continue;
                }
                let importer = normalizer.module_name(importer);
                if importer == name {
                    continue;
                }
                if graph.stories_entry_files.contains(&importer) {
                    graph.spec_globs.insert(idx);
                }
                let reasons = &mut graph.nodes[idx.0].reasons;
                if !reasons.contains(&importer) {
                    reasons.push(importer);
                }
            }
        }

        debug!(
            modules = graph.nodes.len(),
            names = graph.ids_by_name.len(),
            spec_globs = graph.spec_globs.len(),
            skipped,
            "built module graph"
        );
        graph
    }

    pub fn lookup(&self, name: &str) -> Option<NodeIndex> {
        self.ids_by_name.get(name).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ModuleNode {
        &self.nodes[idx.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `name` belongs to a spec-glob module, either as the module
    /// itself or as one of the files concatenated into it.
    pub fn is_spec_glob(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|idx| self.is_spec_glob_node(idx))
    }

    pub fn is_spec_glob_node(&self, idx: NodeIndex) -> bool {
        self.spec_globs.contains(&idx)
    }

    pub fn has_spec_globs(&self) -> bool {
        !self.spec_globs.is_empty()
    }

    pub fn is_stories_entry_file(&self, name: &str) -> bool {
        self.stories_entry_files.contains(name)
    }
}
