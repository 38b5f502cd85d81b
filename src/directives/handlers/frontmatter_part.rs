//! frontmatter-part handler
//!
//! Purely advisory: marks a property as the structural boundary for
//! one-document-becomes-one-array-item expansion. The data transform is the
//! identity; [`crate::document::expand_parts`] consumes the flag outside the
//! directive framework.

use serde_json::{Value, json};

use crate::core::{MatterpipeError, Result};
use crate::directives::DirectiveKind;

use super::{DirectivePayload, StepContext, StepOutput};

/// Extract the boolean flag. Any non-boolean annotation is a hard error.
pub fn extract(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let Some(enabled) = annotation.as_bool() else {
        return Err(MatterpipeError::validation(
            DirectiveKind::FrontmatterPart.name(),
            property,
            format!("expected a boolean, got {}", type_name(annotation)),
        ));
    };
    Ok(DirectivePayload::FrontmatterPart { enabled })
}

/// Identity transform; records the advisory marker on the trail.
#[must_use]
pub fn process(ctx: StepContext<'_>, enabled: bool) -> StepOutput {
    StepOutput::passthrough(
        ctx.data,
        json!({"advisory": true, "part": ctx.property, "enabled": enabled}),
    )
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_boolean_flag() {
        assert_eq!(
            extract("sections", &json!(true)).unwrap(),
            DirectivePayload::FrontmatterPart { enabled: true }
        );
    }

    #[test]
    fn rejects_non_boolean_without_coercion() {
        // "true" the string must not be coerced to true the boolean.
        let err = extract("sections", &json!("true")).unwrap_err();
        assert!(matches!(err, MatterpipeError::Validation { property, .. } if property == "sections"));
    }

    #[test]
    fn process_is_identity() {
        let data = json!({"sections": [1, 2]});
        let out = process(
            StepContext { data: &data, batch: &[], property: "sections" },
            true,
        );
        assert_eq!(out.data, data);
        assert_eq!(out.metrics["advisory"], json!(true));
    }
}
