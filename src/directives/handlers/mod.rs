//! Directive handlers: one transform per directive kind
//!
//! Handlers share a three-part contract:
//! - [`extract_config`]: pull the typed payload out of a schema property.
//!   Absent annotation ⇒ `Ok(None)` (the totality guarantee that lets the
//!   pipeline apply every registered handler unconditionally). A present
//!   annotation with the wrong primitive type, or a malformed path/expression
//!   string, is a hard [`Validation`](crate::core::MatterpipeError::Validation)
//!   error raised before any data is touched.
//! - [`process`]: apply the transform. Handlers are stateless and observe
//!   value semantics: each returns new data rather than mutating shared
//!   state, so they are trivially shareable across threads.
//! - [`extension_entry`]: re-serialize a payload back into its
//!   schema-extension `{key, value}` form.
//!
//! Dispatch is a single exhaustive match over [`DirectiveKind`]; adding a
//! kind is a compile-checked change, not a runtime registration.

pub mod derived;
pub mod filter;
pub mod flatten;
pub mod frontmatter_part;
pub mod template;

use serde_json::Value;

use crate::core::Result;
use crate::directives::{DirectiveKeys, DirectiveKind};
use crate::template::ir::{OutputFormat, RenderPlan, TemplateSource};

/// Typed per-property directive payload, created fresh on every extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectivePayload {
    /// frontmatter-part: expansion boundary flag.
    FrontmatterPart {
        /// Whether the property is an expansion boundary.
        enabled: bool,
    },
    /// derived-from: source path evaluated across the batch.
    DerivedFrom {
        /// Dotted source path; a `[]` segment suffix maps over an array.
        source_path: String,
    },
    /// derived-unique: deduplication flag.
    DerivedUnique {
        /// Whether deduplication is requested.
        enabled: bool,
    },
    /// flatten-arrays: dotted path to the array to flatten.
    FlattenArrays {
        /// Dotted path to the target array.
        target_path: String,
    },
    /// jmespath-filter: query expression.
    JmespathFilter {
        /// The JMESPath expression.
        expression: String,
    },
    /// template: main template binding.
    Template {
        /// Inline text or file reference.
        source: TemplateSource,
    },
    /// template-items: per-item template text.
    TemplateItems {
        /// Item template with `{path.to.field}` placeholders.
        template: String,
    },
    /// template-format: output serialization tag.
    TemplateFormat {
        /// The chosen format.
        format: OutputFormat,
    },
}

/// Read-only view a handler processes against.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The in-flight document data.
    pub data: &'a Value,
    /// Every document in the batch, for cross-document aggregation.
    pub batch: &'a [Value],
    /// Name of the schema property carrying the annotation.
    pub property: &'a str,
}

/// A handler's result: the new data plus per-directive metrics for the trail.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The transformed document data (value semantics; input is untouched).
    pub data: Value,
    /// Structured metrics recorded on the pipeline trail.
    pub metrics: Value,
}

impl StepOutput {
    /// An identity transform that only reports metrics.
    #[must_use]
    pub fn passthrough(data: &Value, metrics: Value) -> Self {
        Self {
            data: data.clone(),
            metrics,
        }
    }
}

/// Extract a directive's typed configuration from one schema property.
///
/// Returns `Ok(None)` when the property does not carry the annotation.
pub fn extract_config(
    kind: DirectiveKind,
    keys: &DirectiveKeys,
    property: &str,
    schema_property: &Value,
) -> Result<Option<DirectivePayload>> {
    let Some(annotation) = schema_property.get(keys.key_for(kind)) else {
        return Ok(None);
    };

    let payload = match kind {
        DirectiveKind::FrontmatterPart => frontmatter_part::extract(property, annotation)?,
        DirectiveKind::DerivedFrom => derived::extract_from(property, annotation)?,
        DirectiveKind::DerivedUnique => derived::extract_unique(property, annotation)?,
        DirectiveKind::FlattenArrays => flatten::extract(property, annotation)?,
        DirectiveKind::JmespathFilter => filter::extract(property, annotation)?,
        DirectiveKind::Template => template::extract_template(property, annotation)?,
        DirectiveKind::TemplateItems => template::extract_items(property, annotation)?,
        DirectiveKind::TemplateFormat => template::extract_format(property, annotation)?,
    };
    Ok(Some(payload))
}

/// Apply a directive's transform to the in-flight data.
///
/// Template-family directives contribute to `plan` instead of (or in
/// addition to) transforming data.
pub fn process(
    payload: &DirectivePayload,
    ctx: StepContext<'_>,
    plan: &mut RenderPlan,
) -> Result<StepOutput> {
    match payload {
        DirectivePayload::FrontmatterPart { enabled } => {
            Ok(frontmatter_part::process(ctx, *enabled))
        }
        DirectivePayload::DerivedFrom { source_path } => derived::process_from(ctx, source_path),
        DirectivePayload::DerivedUnique { enabled } => derived::process_unique(ctx, *enabled),
        DirectivePayload::FlattenArrays { target_path } => flatten::process(ctx, target_path),
        DirectivePayload::JmespathFilter { expression } => filter::process(ctx, expression),
        DirectivePayload::Template { source } => Ok(template::process_template(ctx, plan, source)),
        DirectivePayload::TemplateItems { template: item_template } => {
            template::process_items(ctx, plan, item_template)
        }
        DirectivePayload::TemplateFormat { format } => {
            Ok(template::process_format(ctx, plan, *format))
        }
    }
}

/// Re-serialize a payload into its schema-extension `{key, value}` form.
#[must_use]
pub fn extension_entry(keys: &DirectiveKeys, payload: &DirectivePayload) -> (String, Value) {
    let (kind, value) = match payload {
        DirectivePayload::FrontmatterPart { enabled } => {
            (DirectiveKind::FrontmatterPart, Value::Bool(*enabled))
        }
        DirectivePayload::DerivedFrom { source_path } => {
            (DirectiveKind::DerivedFrom, Value::String(source_path.clone()))
        }
        DirectivePayload::DerivedUnique { enabled } => {
            (DirectiveKind::DerivedUnique, Value::Bool(*enabled))
        }
        DirectivePayload::FlattenArrays { target_path } => {
            (DirectiveKind::FlattenArrays, Value::String(target_path.clone()))
        }
        DirectivePayload::JmespathFilter { expression } => {
            (DirectiveKind::JmespathFilter, Value::String(expression.clone()))
        }
        DirectivePayload::Template { source } => {
            let value = match source {
                TemplateSource::Inline(text) => Value::String(text.clone()),
                TemplateSource::File(path) => {
                    serde_json::json!({"file": path.display().to_string()})
                }
            };
            (DirectiveKind::Template, value)
        }
        DirectivePayload::TemplateItems { template } => {
            (DirectiveKind::TemplateItems, Value::String(template.clone()))
        }
        DirectivePayload::TemplateFormat { format } => {
            (DirectiveKind::TemplateFormat, Value::String(format.tag().to_string()))
        }
    };
    (keys.key_for(kind).to_string(), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_returns_none_for_unannotated_property() {
        let keys = DirectiveKeys::default();
        let property = json!({"type": "string"});
        for kind in DirectiveKind::ALL {
            assert!(extract_config(kind, &keys, "p", &property).unwrap().is_none());
        }
    }

    #[test]
    fn extension_entry_round_trips_through_extract() {
        let keys = DirectiveKeys::default();
        let payloads = [
            DirectivePayload::FrontmatterPart { enabled: true },
            DirectivePayload::DerivedFrom { source_path: "items[].tag".into() },
            DirectivePayload::DerivedUnique { enabled: true },
            DirectivePayload::FlattenArrays { target_path: "nested.values".into() },
            DirectivePayload::JmespathFilter { expression: "items[?keep]".into() },
            DirectivePayload::Template { source: TemplateSource::Inline("{name}".into()) },
            DirectivePayload::Template {
                source: TemplateSource::File("templates/main.json".into()),
            },
            DirectivePayload::TemplateItems { template: "- {title}".into() },
            DirectivePayload::TemplateFormat { format: OutputFormat::Yaml },
        ];
        for payload in payloads {
            let (key, value) = extension_entry(&keys, &payload);
            let kind = DirectiveKind::ALL
                .into_iter()
                .find(|k| keys.key_for(*k) == key)
                .expect("extension key maps to a kind");
            let property = json!({ key.clone(): value });
            let extracted = extract_config(kind, &keys, "p", &property).unwrap();
            assert_eq!(extracted, Some(payload));
        }
    }
}
