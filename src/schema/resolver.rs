//! Cycle-safe `$ref` resolution
//!
//! Walks a schema tree depth-first and splices every reference node (a
//! single-key object `{"$ref": "relative/path.json"}`) with the referenced
//! file's own fully resolved contents. A per-call visited set rejects cycles
//! of any length, including self-references, with an error naming the whole
//! chain. Resolution is purely functional: the input tree is never mutated,
//! and the only side effect is consulting and populating the shared
//! [`SchemaCache`].

use serde_json::{Map, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::core::{MatterpipeError, Result};
use crate::schema::SchemaCache;
use crate::utils::normalize_path;

/// The reserved key marking a reference node.
pub const REF_KEY: &str = "$ref";

/// Resolves schema references against the filesystem through a shared cache.
///
/// Cheap to clone via the inner `Arc`; one resolver may serve many concurrent
/// per-document pipeline runs.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    cache: Arc<SchemaCache>,
}

impl SchemaResolver {
    /// Create a resolver backed by the given cache.
    #[must_use]
    pub fn new(cache: Arc<SchemaCache>) -> Self {
        Self { cache }
    }

    /// The cache this resolver consults.
    #[must_use]
    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Resolve every reference node in `schema` into an inline subtree.
    ///
    /// `schema_path` is the file the tree was loaded from; relative `$ref`
    /// targets resolve against its parent directory. Returns a new tree;
    /// resolving a tree with no reference nodes returns a structural copy of
    /// the input.
    ///
    /// # Errors
    ///
    /// [`MatterpipeError::CircularReference`] when the reference graph loops,
    /// [`MatterpipeError::ReferenceNotFound`] when a target file is missing,
    /// [`MatterpipeError::SchemaParse`] when a target file is not valid JSON.
    pub async fn resolve(&self, schema: &Value, schema_path: &Path) -> Result<Value> {
        let mut visited = vec![normalize_path(schema_path)];
        self.resolve_value(schema, schema_path, &mut visited).await
    }

    /// Depth-first resolution step. Boxed future because the recursion depth
    /// follows the schema's reference nesting.
    fn resolve_value<'a>(
        &'a self,
        value: &'a Value,
        base_path: &'a Path,
        visited: &'a mut Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(target) = reference_target(value) {
                return self.resolve_reference(target, base_path, visited).await;
            }

            match value {
                Value::Object(map) => {
                    let mut resolved = Map::with_capacity(map.len());
                    for (key, child) in map {
                        resolved
                            .insert(key.clone(), self.resolve_value(child, base_path, visited).await?);
                    }
                    Ok(Value::Object(resolved))
                }
                Value::Array(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.resolve_value(item, base_path, visited).await?);
                    }
                    Ok(Value::Array(resolved))
                }
                scalar => Ok(scalar.clone()),
            }
        })
    }

    async fn resolve_reference(
        &self,
        target: &str,
        base_path: &Path,
        visited: &mut Vec<PathBuf>,
    ) -> Result<Value> {
        let base_dir = base_path.parent().unwrap_or_else(|| Path::new("."));
        let target_path = normalize_path(&base_dir.join(target));

        if visited.contains(&target_path) {
            let chain = visited
                .iter()
                .map(|p| p.display().to_string())
                .chain(std::iter::once(target_path.display().to_string()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(MatterpipeError::CircularReference { chain });
        }

        let definition = self.load_definition(&target_path, base_path).await?;

        visited.push(target_path.clone());
        let resolved = self.resolve_value(&definition, &target_path, visited).await;
        visited.pop();
        resolved
    }

    /// Fetch a referenced definition, preferring the cache over disk.
    ///
    /// A cache-set failure is logged and swallowed: the definition is still
    /// returned, only the caching optimization is skipped.
    async fn load_definition(&self, target_path: &Path, referenced_from: &Path) -> Result<Value> {
        if let Some(definition) = self.cache.get(target_path).await {
            tracing::debug!(path = %target_path.display(), "resolved $ref from cache");
            return Ok(definition);
        }

        let text = match tokio::fs::read_to_string(target_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MatterpipeError::ReferenceNotFound {
                    path: target_path.display().to_string(),
                    referenced_from: referenced_from.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let definition: Value =
            serde_json::from_str(&text).map_err(|e| MatterpipeError::SchemaParse {
                file: target_path.display().to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = self.cache.set(target_path, definition.clone()).await {
            tracing::warn!(path = %target_path.display(), error = %e, "schema cache set failed");
        }
        Ok(definition)
    }
}

/// The `$ref` target if `value` is a reference node: an object whose only key
/// is `$ref` with a string value. Objects carrying additional keys are plain
/// data, not references.
#[must_use]
pub fn reference_target(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(REF_KEY)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CacheConfig;
    use serde_json::json;
    use std::fs;

    fn resolver() -> SchemaResolver {
        SchemaResolver::new(Arc::new(SchemaCache::new(CacheConfig::default())))
    }

    fn write(dir: &Path, name: &str, value: &Value) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn reference_target_requires_single_ref_key() {
        assert_eq!(reference_target(&json!({"$ref": "a.json"})), Some("a.json"));
        assert_eq!(reference_target(&json!({"$ref": "a.json", "extra": 1})), None);
        assert_eq!(reference_target(&json!({"$ref": 42})), None);
        assert_eq!(reference_target(&json!("$ref")), None);
    }

    #[tokio::test]
    async fn resolving_ref_free_tree_is_identity() {
        let schema = json!({
            "properties": {
                "name": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });
        let resolved = resolver().resolve(&schema, Path::new("root.json")).await.unwrap();
        assert_eq!(resolved, schema);
    }

    #[tokio::test]
    async fn splices_referenced_file_inline() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "address.json", &json!({"type": "object", "properties": {"city": {"type": "string"}}}));
        let root = write(
            dir.path(),
            "root.json",
            &json!({"properties": {"address": {"$ref": "address.json"}}}),
        );
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let resolved = resolver().resolve(&schema, &root).await.unwrap();
        assert_eq!(
            resolved["properties"]["address"]["properties"]["city"],
            json!({"type": "string"})
        );
    }

    #[tokio::test]
    async fn nested_references_resolve_transitively() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "leaf.json", &json!({"type": "number"}));
        write(dir.path(), "mid.json", &json!({"properties": {"count": {"$ref": "leaf.json"}}}));
        let root = write(dir.path(), "root.json", &json!({"properties": {"stats": {"$ref": "mid.json"}}}));
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let resolved = resolver().resolve(&schema, &root).await.unwrap();
        assert_eq!(resolved["properties"]["stats"]["properties"]["count"], json!({"type": "number"}));
    }

    #[tokio::test]
    async fn self_reference_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "a.json", &json!({"properties": {"me": {"$ref": "a.json"}}}));
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let err = resolver().resolve(&schema, &root).await.unwrap_err();
        match err {
            MatterpipeError::CircularReference { chain } => {
                assert!(chain.matches("a.json").count() >= 2, "chain: {chain}");
            }
            other => panic!("expected CircularReference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_file_cycle_names_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "a.json", &json!({"properties": {"b": {"$ref": "b.json"}}}));
        write(dir.path(), "b.json", &json!({"properties": {"a": {"$ref": "a.json"}}}));
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let err = resolver().resolve(&schema, &root).await.unwrap_err();
        match err {
            MatterpipeError::CircularReference { chain } => {
                assert!(chain.contains("a.json"), "chain: {chain}");
                assert!(chain.contains("b.json"), "chain: {chain}");
            }
            other => panic!("expected CircularReference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn diamond_references_are_not_cycles() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "shared.json", &json!({"type": "string"}));
        let root = write(
            dir.path(),
            "root.json",
            &json!({"properties": {
                "x": {"$ref": "shared.json"},
                "y": {"$ref": "shared.json"}
            }}),
        );
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let resolved = resolver().resolve(&schema, &root).await.unwrap();
        assert_eq!(resolved["properties"]["x"], json!({"type": "string"}));
        assert_eq!(resolved["properties"]["y"], json!({"type": "string"}));
    }

    #[tokio::test]
    async fn missing_reference_names_offending_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "root.json", &json!({"properties": {"x": {"$ref": "missing.json"}}}));
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let err = resolver().resolve(&schema, &root).await.unwrap_err();
        match err {
            MatterpipeError::ReferenceNotFound { path, referenced_from } => {
                assert!(path.contains("missing.json"));
                assert!(referenced_from.contains("root.json"));
            }
            other => panic!("expected ReferenceNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn input_tree_is_not_mutated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "leaf.json", &json!({"type": "boolean"}));
        let root = write(dir.path(), "root.json", &json!({"properties": {"x": {"$ref": "leaf.json"}}}));
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
        let before = schema.clone();
        let _ = resolver().resolve(&schema, &root).await.unwrap();
        assert_eq!(schema, before);
    }

    #[tokio::test]
    async fn second_resolution_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "leaf.json", &json!({"type": "string"}));
        let root = write(dir.path(), "root.json", &json!({"properties": {"x": {"$ref": "leaf.json"}}}));
        let schema: Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();

        let resolver = resolver();
        let _ = resolver.resolve(&schema, &root).await.unwrap();
        let _ = resolver.resolve(&schema, &root).await.unwrap();
        assert!(resolver.cache().stats().hits >= 1);
    }
}
