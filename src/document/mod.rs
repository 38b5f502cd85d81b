//! Document loading: frontmatter extraction and part expansion.
//!
//! A document is a text file with a leading YAML frontmatter block. The core
//! only consumes the already-parsed key/value mapping; this module is the
//! external collaborator that produces it, plus the expansion step that turns
//! one document into many data values along a part boundary (the property the
//! frontmatter-part directive marks).

use gray_matter::{Matter, engine::YAML};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::{MatterpipeError, Result};

/// One loaded document: its parsed frontmatter and remaining body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Where the document was read from.
    pub path: PathBuf,
    /// Parsed frontmatter as a JSON object (empty object when absent).
    pub data: Value,
    /// Body text after the frontmatter block.
    pub body: String,
}

/// Parse frontmatter out of raw document content.
pub fn parse_document(path: &Path, content: &str) -> Result<Document> {
    let matter = Matter::<YAML>::new();
    let parsed = matter.parse::<serde_yaml::Value>(content).map_err(|e| {
        MatterpipeError::Frontmatter {
            file: path.display().to_string(),
            reason: e.to_string(),
        }
    })?;

    let data = match parsed.data {
        Some(yaml) => {
            let value = serde_json::to_value(yaml).map_err(|e| MatterpipeError::Frontmatter {
                file: path.display().to_string(),
                reason: format!("frontmatter is not representable as JSON: {e}"),
            })?;
            if !value.is_object() {
                return Err(MatterpipeError::Frontmatter {
                    file: path.display().to_string(),
                    reason: "frontmatter must be a key/value mapping".to_string(),
                });
            }
            value
        }
        None => Value::Object(Map::new()),
    };

    Ok(Document { path: path.to_path_buf(), data, body: parsed.content })
}

/// Load and parse one document file.
pub async fn load_document(path: &Path) -> Result<Document> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_document(path, &content)
}

/// Load every `.md` and `.txt` document under a directory, sorted by path
/// so batch order is stable across platforms.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| MatterpipeError::Frontmatter {
            file: dir.display().to_string(),
            reason: format!("directory walk failed: {e}"),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.path().extension().and_then(|ext| ext.to_str()) {
            Some("md" | "txt") => paths.push(entry.into_path()),
            _ => {}
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        documents.push(load_document(&path).await?);
    }
    tracing::debug!(count = documents.len(), dir = %dir.display(), "loaded documents");
    Ok(documents)
}

/// Expand one document's data along a part boundary.
///
/// Each element of the array at `part` becomes its own data value inheriting
/// the parent's remaining fields; object elements merge over the parent
/// (element keys win), scalar elements land back under the part property.
/// Data without an array at `part` expands to itself.
#[must_use]
pub fn expand_parts(data: &Value, part: &str) -> Vec<Value> {
    let Some(items) = data.get(part).and_then(Value::as_array) else {
        return vec![data.clone()];
    };
    let parent: Map<String, Value> = match data {
        Value::Object(map) => {
            map.iter().filter(|(k, _)| *k != part).map(|(k, v)| (k.clone(), v.clone())).collect()
        }
        _ => Map::new(),
    };

    items
        .iter()
        .map(|item| {
            let mut expanded = parent.clone();
            match item {
                Value::Object(fields) => {
                    for (key, value) in fields {
                        expanded.insert(key.clone(), value.clone());
                    }
                }
                scalar => {
                    expanded.insert(part.to_string(), scalar.clone());
                }
            }
            Value::Object(expanded)
        })
        .collect()
}
