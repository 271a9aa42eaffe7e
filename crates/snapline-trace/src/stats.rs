use serde::Deserialize;
use snapline_core::error::StatsError;
use std::fmt;
use std::path::Path;

/// The subset of a bundler stats file the module graph needs. Unknown fields
/// are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsDocument {
    #[serde(default)]
    pub modules: Vec<StatsModule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsModule {
    #[serde(default)]
    pub id: Option<ModuleId>,
    pub name: String,
    /// Modules concatenated into this one.
    #[serde(default)]
    pub modules: Vec<ConcatenatedModule>,
    #[serde(default)]
    pub reasons: Vec<Reason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcatenatedModule {
    pub name: String,
}

/// One importer of a module.
#[derive(Debug, Clone, Deserialize)]
pub struct Reason {
    #[serde(rename = "moduleName", default)]
    pub module_name: Option<String>,
}

/// Bundlers emit numeric ids in production builds and path-like ids otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum ModuleId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl StatsDocument {
    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let raw = std::fs::read_to_string(path).map_err(|_| StatsError::Missing {
            path: path.display().to_string(),
        })?;
        Self::parse(&raw).map_err(|reason| StatsError::Parse {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_webpack_shaped_modules() {
        let doc = StatsDocument::parse(
            r#"{
                "version": "5.88.0",
                "modules": [
                    {"id": 12, "name": "./src/a.js", "size": 40,
                     "reasons": [{"moduleName": "./src/b.js", "type": "harmony import"}]},
                    {"id": "./src/b.js + 2 modules", "name": "./src/b.js + 2 modules",
                     "modules": [{"name": "./src/b.js"}, {"name": "./src/c.js"}]},
                    {"id": null, "name": "ignored"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.modules.len(), 3);
        assert_eq!(doc.modules[0].id.as_ref().unwrap().to_string(), "12");
        assert_eq!(
            doc.modules[0].reasons[0].module_name.as_deref(),
            Some("./src/b.js")
        );
        assert_eq!(doc.modules[1].modules.len(), 2);
        assert!(doc.modules[2].id.is_none());
    }

    #[test]
    fn missing_and_malformed_files_are_distinct_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            StatsDocument::load(&missing),
            Err(StatsError::Missing { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{\"modules\": [").unwrap();
        assert!(matches!(
            StatsDocument::load(&broken),
            Err(StatsError::Parse { .. })
        ));
    }
}
