//! flatten-arrays handler
//!
//! Recursively flattens nested arrays found at a dotted target path down to a
//! single depth, reporting the original and final nesting depth alongside the
//! item count. Flattening an already-flat array returns it unchanged (fixed
//! point), and a target path that does not resolve to an array is a no-op.

use serde_json::{Value, json};

use crate::core::{MatterpipeError, Result};
use crate::directives::DirectiveKind;

use super::frontmatter_part::type_name;
use super::{DirectivePayload, StepContext, StepOutput};

/// Extract the dotted target path. Validated at extraction time.
pub fn extract(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let directive = DirectiveKind::FlattenArrays.name();
    let Some(target_path) = annotation.as_str() else {
        return Err(MatterpipeError::validation(
            directive,
            property,
            format!("expected a string target path, got {}", type_name(annotation)),
        ));
    };
    // The target never maps over arrays, so reuse the path grammar with
    // `[]` segments rejected.
    let segments = super::derived::parse_path(directive, property, target_path)?;
    if segments.iter().any(|s| s.each) {
        return Err(MatterpipeError::validation(
            directive,
            property,
            format!("'[]' segments are not allowed in target path '{target_path}'"),
        ));
    }
    Ok(DirectivePayload::FlattenArrays { target_path: target_path.to_string() })
}

/// Flatten the array at the target path; no-op when the path misses.
pub fn process(ctx: StepContext<'_>, target_path: &str) -> Result<StepOutput> {
    let directive = DirectiveKind::FlattenArrays.name();
    let segments: Vec<&str> = target_path.split('.').collect();

    let Some(Value::Array(items)) = lookup(ctx.data, &segments) else {
        return Ok(StepOutput::passthrough(
            ctx.data,
            json!({"skipped": true, "target_path": target_path}),
        ));
    };

    let original_depth = depth(items);
    let mut flat = Vec::with_capacity(items.len());
    flatten_into(items, &mut flat);
    let final_depth = depth(&flat);
    let item_count = flat.len();

    let mut data = ctx.data.clone();
    let Some(slot) = lookup_mut(&mut data, &segments) else {
        return Err(MatterpipeError::processing(
            directive,
            format!("target path '{target_path}' vanished during flatten"),
        ));
    };
    *slot = Value::Array(flat);

    tracing::debug!(target_path, original_depth, final_depth, item_count, "flattened arrays");
    Ok(StepOutput {
        data,
        metrics: json!({
            "target_path": target_path,
            "original_depth": original_depth,
            "final_depth": final_depth,
            "item_count": item_count,
        }),
    })
}

/// Maximum nesting depth of an array's elements, where a flat array is 1.
fn depth(items: &[Value]) -> usize {
    1 + items
        .iter()
        .filter_map(|item| item.as_array().map(|inner| depth(inner)))
        .max()
        .unwrap_or(0)
}

fn flatten_into(items: &[Value], out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) => flatten_into(inner, out),
            other => out.push(other.clone()),
        }
    }
}

fn lookup<'a>(data: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(data, |value, segment| value.get(segment))
}

fn lookup_mut<'a>(data: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    segments.iter().try_fold(data, |value, segment| value.get_mut(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(data: &'a Value, property: &'a str) -> StepContext<'a> {
        StepContext { data, batch: &[], property }
    }

    #[test]
    fn extract_rejects_non_string_and_each_segments() {
        assert!(extract("values", &json!(false)).is_err());
        assert!(extract("values", &json!("items[].x")).is_err());
        assert!(extract("values", &json!("nested.values")).is_ok());
    }

    #[test]
    fn flattens_nested_arrays_to_single_depth() {
        let data = json!({"values": [[1, [2, 3]], 4, [[5]]]});
        let out = process(ctx(&data, "values"), "values").unwrap();
        assert_eq!(out.data["values"], json!([1, 2, 3, 4, 5]));
        assert_eq!(out.metrics["original_depth"], json!(3));
        assert_eq!(out.metrics["final_depth"], json!(1));
        assert_eq!(out.metrics["item_count"], json!(5));
    }

    #[test]
    fn flat_array_is_a_fixed_point() {
        let data = json!({"values": [1, 2, 3]});
        let out = process(ctx(&data, "values"), "values").unwrap();
        assert_eq!(out.data, data);
        assert_eq!(out.metrics["original_depth"], out.metrics["final_depth"]);
    }

    #[test]
    fn reaches_arrays_at_dotted_paths() {
        let data = json!({"stats": {"samples": [[1], [2, [3]]]}});
        let out = process(ctx(&data, "samples"), "stats.samples").unwrap();
        assert_eq!(out.data["stats"]["samples"], json!([1, 2, 3]));
    }

    #[test]
    fn non_array_target_is_a_noop() {
        let data = json!({"values": {"not": "an array"}});
        let out = process(ctx(&data, "values"), "values").unwrap();
        assert_eq!(out.data, data);
        assert_eq!(out.metrics["skipped"], json!(true));
    }

    #[test]
    fn missing_path_is_a_noop() {
        let data = json!({"other": 1});
        let out = process(ctx(&data, "values"), "values").unwrap();
        assert_eq!(out.data, data);
    }
}
