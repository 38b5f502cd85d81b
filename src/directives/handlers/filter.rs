//! jmespath-filter handler
//!
//! Evaluates a JMESPath expression against the whole document data and stores
//! the result at the annotated property. Nested-array results are flattened
//! one level before and after evaluation to keep output shapes
//! template-friendly. An empty or null result falls back to returning the
//! original data untouched rather than erasing it.

use serde_json::{Value, json};

use crate::core::{MatterpipeError, Result};
use crate::directives::DirectiveKind;
use crate::query;

use super::frontmatter_part::type_name;
use super::{DirectivePayload, StepContext, StepOutput};

/// Extract the expression; compile-checks it so malformed expressions are
/// rejected before any data is touched.
pub fn extract(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let directive = DirectiveKind::JmespathFilter.name();
    let Some(expression) = annotation.as_str() else {
        return Err(MatterpipeError::validation(
            directive,
            property,
            format!("expected a string expression, got {}", type_name(annotation)),
        ));
    };
    if expression.trim().is_empty() {
        return Err(MatterpipeError::validation(
            directive,
            property,
            "expression must not be empty".to_string(),
        ));
    }
    query::compile_check(expression).map_err(|e| {
        MatterpipeError::validation(directive, property, e.to_string())
    })?;
    Ok(DirectivePayload::JmespathFilter { expression: expression.to_string() })
}

/// Evaluate the expression and store the result at the annotated property.
pub fn process(ctx: StepContext<'_>, expression: &str) -> Result<StepOutput> {
    let directive = DirectiveKind::JmespathFilter.name();

    let input = flatten_one_level(ctx.data.clone());
    let result = flatten_one_level(query::search(expression, &input)?);

    if is_empty_result(&result) {
        tracing::debug!(expression, "filter matched nothing, keeping original data");
        return Ok(StepOutput::passthrough(
            ctx.data,
            json!({"expression": expression, "fallback": true}),
        ));
    }

    let Some(mut data) = ctx.data.as_object().cloned() else {
        return Err(MatterpipeError::processing(
            directive,
            format!("document data must be an object, got {}", type_name(ctx.data)),
        ));
    };
    let matched = match &result {
        Value::Array(items) => items.len(),
        _ => 1,
    };
    data.insert(ctx.property.to_string(), result);

    Ok(StepOutput {
        data: Value::Object(data),
        metrics: json!({"expression": expression, "matched": matched, "fallback": false}),
    })
}

/// Flatten array-of-arrays values one level; everything else passes through.
fn flatten_one_level(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };
    if !items.iter().any(Value::is_array) {
        return Value::Array(items);
    }
    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    Value::Array(flat)
}

fn is_empty_result(result: &Value) -> bool {
    match result {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(data: &'a Value, property: &'a str) -> StepContext<'a> {
        StepContext { data, batch: &[], property }
    }

    #[test]
    fn extract_rejects_malformed_expressions_before_processing() {
        assert!(extract("picked", &json!("items[?keep]")).is_ok());
        assert!(extract("picked", &json!("items[")).is_err());
        assert!(extract("picked", &json!("  ")).is_err());
        assert!(extract("picked", &json!(42)).is_err());
    }

    #[test]
    fn stores_filter_result_at_annotated_property() {
        let data = json!({"items": [{"n": 1, "keep": true}, {"n": 2, "keep": false}]});
        let out = process(ctx(&data, "picked"), "items[?keep].n").unwrap();
        assert_eq!(out.data["picked"], json!([1]));
        assert_eq!(out.data["items"], data["items"]);
        assert_eq!(out.metrics["matched"], json!(1));
    }

    #[test]
    fn empty_result_keeps_original_data() {
        let data = json!({"items": [{"keep": false}]});
        let out = process(ctx(&data, "picked"), "items[?keep]").unwrap();
        assert_eq!(out.data, data);
        assert_eq!(out.metrics["fallback"], json!(true));
    }

    #[test]
    fn null_result_keeps_original_data() {
        let data = json!({"a": 1});
        let out = process(ctx(&data, "picked"), "missing.path").unwrap();
        assert_eq!(out.data, data);
    }

    #[test]
    fn nested_array_results_are_flattened_one_level() {
        let data = json!({"groups": [{"tags": ["a", "b"]}, {"tags": ["c"]}]});
        let out = process(ctx(&data, "tags"), "groups[].tags").unwrap();
        assert_eq!(out.data["tags"], json!(["a", "b", "c"]));
    }

    #[test]
    fn flatten_one_level_only_removes_one_layer() {
        let value = json!([[1, [2]], [3]]);
        assert_eq!(flatten_one_level(value), json!([1, [2], 3]));
    }
}
