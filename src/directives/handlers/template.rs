//! template, template-items, and template-format handlers
//!
//! None of these transform the document data destructively; they accumulate
//! render state on the [`RenderPlan`] that later seeds the template IR.
//! template binds the main template (inline text or a file reference),
//! template-items renders an item template against every element of the
//! annotated array, and template-format records the output serialization tag.

use serde_json::{Value, json};
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::{MatterpipeError, Result};
use crate::directives::DirectiveKind;
use crate::template::ir::{OutputFormat, RenderPlan, TemplateConfig, TemplateSource};
use crate::template::renderer::interpolate;

use super::frontmatter_part::type_name;
use super::{DirectivePayload, StepContext, StepOutput};

/// Extract the main template binding: an inline string or `{"file": path}`.
pub fn extract_template(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let directive = DirectiveKind::Template.name();
    let source = match annotation {
        Value::String(text) => TemplateSource::Inline(text.clone()),
        Value::Object(map) => {
            let Some(file) = map.get("file").and_then(Value::as_str) else {
                return Err(MatterpipeError::validation(
                    directive,
                    property,
                    "template object must carry a string 'file' key".to_string(),
                ));
            };
            TemplateSource::File(PathBuf::from(file))
        }
        other => {
            return Err(MatterpipeError::validation(
                directive,
                property,
                format!("expected a string or file reference, got {}", type_name(other)),
            ));
        }
    };
    Ok(DirectivePayload::Template { source })
}

/// Extract the per-item template string.
pub fn extract_items(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let directive = DirectiveKind::TemplateItems.name();
    let Some(template) = annotation.as_str() else {
        return Err(MatterpipeError::validation(
            directive,
            property,
            format!("expected a string item template, got {}", type_name(annotation)),
        ));
    };
    if template.is_empty() {
        return Err(MatterpipeError::validation(
            directive,
            property,
            "item template must not be empty".to_string(),
        ));
    }
    Ok(DirectivePayload::TemplateItems { template: template.to_string() })
}

/// Extract and parse the output format tag.
pub fn extract_format(property: &str, annotation: &Value) -> Result<DirectivePayload> {
    let directive = DirectiveKind::TemplateFormat.name();
    let Some(tag) = annotation.as_str() else {
        return Err(MatterpipeError::validation(
            directive,
            property,
            format!("expected a string format tag, got {}", type_name(annotation)),
        ));
    };
    let format = OutputFormat::from_str(tag).map_err(|_| {
        MatterpipeError::validation(
            directive,
            property,
            format!("unknown format '{tag}' (expected json, yaml, markdown, or xml)"),
        )
    })?;
    Ok(DirectivePayload::TemplateFormat { format })
}

/// Record the main template on the render plan; identity on data.
#[must_use]
pub fn process_template(
    ctx: StepContext<'_>,
    plan: &mut RenderPlan,
    source: &TemplateSource,
) -> StepOutput {
    plan.main_template = Some(source.clone());
    let kind = match source {
        TemplateSource::Inline(_) => "inline",
        TemplateSource::File(_) => "file",
    };
    StepOutput::passthrough(ctx.data, json!({"template": kind, "property": ctx.property}))
}

/// Render the item template against every element of the annotated array.
///
/// Rendered items land on the render plan; a property that does not hold an
/// array is a no-op.
pub fn process_items(
    ctx: StepContext<'_>,
    plan: &mut RenderPlan,
    item_template: &str,
) -> Result<StepOutput> {
    plan.items_template = Some(item_template.to_string());

    let Some(items) = ctx.data.get(ctx.property).and_then(Value::as_array) else {
        return Ok(StepOutput::passthrough(ctx.data, json!({"skipped": "not an array"})));
    };

    // Item rendering is always lenient: a per-item template missing a field
    // on one element must not abort the whole batch.
    let config = TemplateConfig::default();
    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        rendered.push(Value::String(interpolate(item_template, item, config)?));
    }
    let count = rendered.len();
    plan.items = Some(rendered);

    tracing::debug!(property = ctx.property, count, "rendered item templates");
    Ok(StepOutput::passthrough(ctx.data, json!({"items": count})))
}

/// Record the output format on the render plan; identity on data.
#[must_use]
pub fn process_format(
    ctx: StepContext<'_>,
    plan: &mut RenderPlan,
    format: OutputFormat,
) -> StepOutput {
    plan.output_format = Some(format);
    StepOutput::passthrough(ctx.data, json!({"format": format.tag()}))
}
