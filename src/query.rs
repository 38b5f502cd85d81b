//! Narrow seam around the JMESPath implementation
//!
//! The core never talks to the `jmespath` crate directly; everything goes
//! through [`compile_check`] and [`search`] so the query engine stays a
//! swappable external capability. Errors surface as
//! [`MatterpipeError::Processing`] attributed to the jmespath-filter
//! directive.

use serde_json::Value;

use crate::core::{MatterpipeError, Result};

const DIRECTIVE: &str = "jmespath-filter";

/// Validate an expression without evaluating it.
///
/// Used at directive-extraction time so malformed expressions are rejected
/// before any document data is touched.
pub fn compile_check(expression: &str) -> Result<()> {
    jmespath::compile(expression).map(|_| ()).map_err(|e| {
        MatterpipeError::processing(DIRECTIVE, format!("invalid expression '{expression}': {e}"))
    })
}

/// Evaluate a JMESPath expression against a JSON value.
///
/// Returns the query result as a plain [`serde_json::Value`]; `null` means
/// the expression matched nothing.
pub fn search(expression: &str, data: &Value) -> Result<Value> {
    let compiled = jmespath::compile(expression).map_err(|e| {
        MatterpipeError::processing(DIRECTIVE, format!("invalid expression '{expression}': {e}"))
    })?;

    let input = jmespath::Variable::from_serializable(data).map_err(|e| {
        MatterpipeError::processing(DIRECTIVE, format!("failed to convert input data: {e}"))
    })?;

    let result = compiled.search(input).map_err(|e| {
        MatterpipeError::processing(DIRECTIVE, format!("query '{expression}' failed: {e}"))
    })?;

    serde_json::to_value(result.as_ref()).map_err(|e| {
        MatterpipeError::processing(DIRECTIVE, format!("failed to convert query result: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn searches_nested_paths() {
        let data = json!({"spec": {"replicas": 3}});
        assert_eq!(search("spec.replicas", &data).unwrap(), json!(3));
    }

    #[test]
    fn projects_over_arrays() {
        let data = json!({"items": [{"tag": "a"}, {"tag": "b"}]});
        assert_eq!(search("items[].tag", &data).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn filters_with_predicates() {
        let data = json!({"items": [{"n": 1, "keep": true}, {"n": 2, "keep": false}]});
        assert_eq!(search("items[?keep].n", &data).unwrap(), json!([1]));
    }

    #[test]
    fn unmatched_path_yields_null() {
        assert_eq!(search("does.not.exist", &json!({})).unwrap(), json!(null));
    }

    #[test]
    fn malformed_expression_is_a_processing_error() {
        let err = compile_check("items[").unwrap_err();
        match err {
            MatterpipeError::Processing { directive, .. } => {
                assert_eq!(directive, "jmespath-filter");
            }
            other => panic!("expected Processing, got {other:?}"),
        }
    }
}
