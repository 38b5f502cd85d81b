//! derived-from and derived-unique handlers
//!
//! derived-from collects values from a source path across every document in
//! the batch into an array stored at the annotated property, in batch order.
//! derived-unique runs at a later stage (and depends on derived-from) and
//! deduplicates that array in place: objects compare by canonical key-sorted
//! serialization, primitives by value, and the first occurrence wins.
//!
//! The source path is dotted; a segment suffix of `[]` maps the rest of the
//! path over each element of an array, so `items[].tag` collects the `tag`
//! of every entry in `items`.

use serde_json::{Map, Value, json};
use std::collections::HashSet;

use crate::core::{MatterpipeError, Result};
use crate::directives::DirectiveKind;

use super::frontmatter_part::type_name;
use super::{DirectivePayload, StepContext, StepOutput};

/// One parsed segment of a source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) name: String,
    /// Whether the segment carries a trailing `[]` (map over array).
    pub(crate) each: bool,
}

/// Parse and validate a dotted source path.
///
/// Rejects empty segments, unbalanced `[]` delimiters, and characters outside
/// `[A-Za-z0-9_-]` in segment names.
pub(crate) fn parse_path(directive: &str, property: &str, path: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: String| MatterpipeError::validation(directive, property, reason);

    if path.is_empty() {
        return Err(invalid("source path must not be empty".into()));
    }

    let mut segments = Vec::new();
    for raw in path.split('.') {
        let (name, each) = match raw.strip_suffix("[]") {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        if name.is_empty() {
            return Err(invalid(format!("empty segment in path '{path}'")));
        }
        if name.contains('[') || name.contains(']') {
            return Err(invalid(format!(
                "unbalanced '[]' delimiters in segment '{raw}' of path '{path}'"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(invalid(format!("invalid characters in segment '{name}' of path '{path}'")));
        }
        segments.push(Segment { name: name.to_string(), each });
    }
    Ok(segments)
}

/// Extract a derived-from source path, validating the path syntax up front.
pub fn extract_from(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let directive = DirectiveKind::DerivedFrom.name();
    let Some(source_path) = annotation.as_str() else {
        return Err(MatterpipeError::validation(
            directive,
            property,
            format!("expected a string source path, got {}", type_name(annotation)),
        ));
    };
    parse_path(directive, property, source_path)?;
    Ok(DirectivePayload::DerivedFrom { source_path: source_path.to_string() })
}

/// Extract the derived-unique flag.
pub fn extract_unique(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let Some(enabled) = annotation.as_bool() else {
        return Err(MatterpipeError::validation(
            DirectiveKind::DerivedUnique.name(),
            property,
            format!("expected a boolean, got {}", type_name(annotation)),
        ));
    };
    Ok(DirectivePayload::DerivedUnique { enabled })
}

/// Collect source-path values across the batch into the annotated property.
pub fn process_from(ctx: StepContext<'_>, source_path: &str) -> Result<StepOutput> {
    let directive = DirectiveKind::DerivedFrom.name();
    let segments = parse_path(directive, ctx.property, source_path)?;

    let mut collected = Vec::new();
    for document in ctx.batch {
        collect(document, &segments, &mut collected);
    }

    let mut data = as_object(ctx.data, directive)?;
    let count = collected.len();
    data.insert(ctx.property.to_string(), Value::Array(collected));

    tracing::debug!(property = ctx.property, source_path, count, "derived values collected");
    Ok(StepOutput {
        data: Value::Object(data),
        metrics: json!({
            "source_path": source_path,
            "documents": ctx.batch.len(),
            "collected": count,
        }),
    })
}

/// Deduplicate the array at the annotated property, first occurrence wins.
///
/// No-ops (with a skip marker in the metrics) when the flag is false or the
/// property does not hold an array.
pub fn process_unique(ctx: StepContext<'_>, enabled: bool) -> Result<StepOutput> {
    if !enabled {
        return Ok(StepOutput::passthrough(ctx.data, json!({"skipped": "disabled"})));
    }

    let Some(items) = ctx.data.get(ctx.property).and_then(Value::as_array) else {
        return Ok(StepOutput::passthrough(ctx.data, json!({"skipped": "not an array"})));
    };

    let before = items.len();
    let mut seen = HashSet::with_capacity(before);
    let mut unique = Vec::with_capacity(before);
    for item in items {
        if seen.insert(canonical_string(item)) {
            unique.push(item.clone());
        }
    }
    let after = unique.len();

    let mut data = as_object(ctx.data, DirectiveKind::DerivedUnique.name())?;
    data.insert(ctx.property.to_string(), Value::Array(unique));

    Ok(StepOutput {
        data: Value::Object(data),
        metrics: json!({"before": before, "after": after}),
    })
}

fn collect(value: &Value, segments: &[Segment], out: &mut Vec<Value>) {
    let Some(segment) = segments.first() else {
        out.push(value.clone());
        return;
    };
    let Some(child) = value.get(&segment.name) else {
        return;
    };
    if segment.each {
        if let Some(items) = child.as_array() {
            for item in items {
                collect(item, &segments[1..], out);
            }
        }
    } else {
        collect(child, &segments[1..], out);
    }
}

fn as_object(data: &Value, directive: &str) -> Result<Map<String, Value>> {
    data.as_object().cloned().ok_or_else(|| {
        MatterpipeError::processing(
            directive,
            format!("document data must be an object, got {}", type_name(data)),
        )
    })
}

/// Canonical serialization with recursively key-sorted objects.
///
/// Two structurally equal objects compare equal regardless of the key order
/// their source documents happened to use.
pub(crate) fn canonical_string(value: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: std::collections::BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
                json!(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            scalar => scalar.clone(),
        }
    }
    canonicalize(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(data: &'a Value, batch: &'a [Value], property: &'a str) -> StepContext<'a> {
        StepContext { data, batch, property }
    }

    #[test]
    fn path_parsing_accepts_each_segments() {
        let segments = parse_path("derived-from", "tags", "items[].tag").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment { name: "items".into(), each: true },
                Segment { name: "tag".into(), each: false },
            ]
        );
    }

    #[test]
    fn path_parsing_rejects_unbalanced_brackets() {
        for bad in ["items[.tag", "items].tag", "items[0].tag", "[].tag"] {
            let err = parse_path("derived-from", "tags", bad).unwrap_err();
            assert!(matches!(err, MatterpipeError::Validation { .. }), "accepted {bad}");
        }
    }

    #[test]
    fn path_parsing_rejects_empty_and_invalid_segments() {
        assert!(parse_path("derived-from", "tags", "").is_err());
        assert!(parse_path("derived-from", "tags", "a..b").is_err());
        assert!(parse_path("derived-from", "tags", "a.b c").is_err());
    }

    #[test]
    fn extract_rejects_non_string_path() {
        assert!(extract_from("tags", &json!(7)).is_err());
    }

    #[test]
    fn collects_across_batch_in_order() {
        let batch = vec![
            json!({"items": [{"tag": "a"}, {"tag": "b"}]}),
            json!({"items": [{"tag": "a"}]}),
        ];
        let data = json!({});
        let out = process_from(ctx(&data, &batch, "tags"), "items[].tag").unwrap();
        assert_eq!(out.data["tags"], json!(["a", "b", "a"]));
        assert_eq!(out.metrics["collected"], json!(3));
    }

    #[test]
    fn missing_source_paths_contribute_nothing() {
        let batch = vec![json!({"other": 1}), json!({"items": [{"tag": "x"}]})];
        let data = json!({});
        let out = process_from(ctx(&data, &batch, "tags"), "items[].tag").unwrap();
        assert_eq!(out.data["tags"], json!(["x"]));
    }

    #[test]
    fn unique_preserves_first_occurrence_order() {
        let data = json!({"tags": ["b", "a", "b", "c", "a"]});
        let out = process_unique(ctx(&data, &[], "tags"), true).unwrap();
        assert_eq!(out.data["tags"], json!(["b", "a", "c"]));
        assert_eq!(out.metrics, json!({"before": 5, "after": 3}));
    }

    #[test]
    fn unique_is_idempotent() {
        let data = json!({"tags": ["a", "b", "a"]});
        let once = process_unique(ctx(&data, &[], "tags"), true).unwrap();
        let twice = process_unique(ctx(&once.data, &[], "tags"), true).unwrap();
        assert_eq!(once.data, twice.data);
    }

    #[test]
    fn unique_compares_objects_by_canonical_form() {
        // Same fields, different key order: one survivor.
        let data = json!({"entries": [
            {"a": 1, "b": 2},
            {"b": 2, "a": 1},
            {"a": 1, "b": 3}
        ]});
        let out = process_unique(ctx(&data, &[], "entries"), true).unwrap();
        assert_eq!(out.data["entries"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn unique_noop_when_property_is_not_an_array() {
        let data = json!({"tags": "scalar"});
        let out = process_unique(ctx(&data, &[], "tags"), true).unwrap();
        assert_eq!(out.data, data);
    }

    #[test]
    fn canonical_string_sorts_nested_keys() {
        let a = json!({"outer": {"x": 1, "y": [{"b": 2, "a": 1}]}});
        let b = json!({"outer": {"y": [{"a": 1, "b": 2}], "x": 1}});
        assert_eq!(canonical_string(&a), canonical_string(&b));
    }
}
