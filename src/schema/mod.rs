//! Schema loading, caching, and reference resolution
//!
//! Schemas are JSON documents in an extended-JSON-Schema dialect: any property
//! object may carry directive annotations (see [`crate::directives`]) and may
//! contain a single-key `{"$ref": "relative/path.json"}` object pointing at
//! another schema file. The [`resolver`] splices referenced files inline,
//! consulting the [`cache`] for previously loaded definitions, so that a
//! resolved schema contains no reference nodes anywhere in its tree.

pub mod cache;
pub mod resolver;

pub use cache::{CacheConfig, CacheStats, EvictionPolicy, SchemaCache};
pub use resolver::SchemaResolver;

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::core::{MatterpipeError, Result};

/// A schema document identified by its path.
///
/// Holds the parsed (not yet resolved) definition tree. Run it through
/// [`SchemaResolver::resolve`] before handing it to the pipeline.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Path the definition was loaded from.
    pub path: PathBuf,
    /// The parsed definition tree.
    pub definition: Value,
}

impl Schema {
    /// Load and parse a schema file.
    ///
    /// # Errors
    ///
    /// [`MatterpipeError::Io`] when the file cannot be read,
    /// [`MatterpipeError::SchemaParse`] when it is not valid JSON.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let definition: Value =
            serde_json::from_str(&text).map_err(|e| MatterpipeError::SchemaParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), "loaded schema");
        Ok(Self {
            path: path.to_path_buf(),
            definition,
        })
    }

    /// The schema's `properties` map, if the definition declares one.
    #[must_use]
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        properties_of(&self.definition)
    }
}

/// The `properties` map of an arbitrary schema value, if present.
#[must_use]
pub fn properties_of(definition: &Value) -> Option<&Map<String, Value>> {
    definition.get("properties")?.as_object()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn load_parses_valid_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{"properties":{"name":{"type":"string"}}}"#).unwrap();
        let schema = Schema::load(&path).await.unwrap();
        assert!(schema.properties().unwrap().contains_key("name"));
    }

    #[tokio::test]
    async fn load_reports_parse_errors_with_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Schema::load(&path).await.unwrap_err();
        match err {
            MatterpipeError::SchemaParse { file, .. } => assert!(file.contains("broken.json")),
            other => panic!("expected SchemaParse, got {other:?}"),
        }
    }

    #[test]
    fn properties_of_tolerates_missing_map() {
        assert!(properties_of(&json!({"type": "string"})).is_none());
        assert!(properties_of(&json!({"properties": {"a": {}}})).is_some());
    }
}
