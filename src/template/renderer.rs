//! Structure-aware template rendering.
//!
//! The renderer takes a frozen [`TemplateIr`] and produces output text. The
//! central trick is JSON awareness: when the template text itself parses as
//! JSON, the renderer walks the parsed tree and replaces whole-value
//! placeholders (a string node that is *entirely* `{path}`) with the typed
//! value resolved from the context, so an array stays an array and a number
//! stays a number instead of collapsing to a string. Mixed strings inside a
//! JSON template, and all non-JSON templates, fall back to plain `{path}`
//! interpolation.
//!
//! Missing variables are lenient by default (the placeholder is left in
//! place); [`TemplateConfig::strict_variables`] turns them into
//! [`MatterpipeError::MissingVariable`]. RFC 3339 timestamps embedded in
//! string values are normalized to a fixed UTC format regardless of where
//! they appear.

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::core::{MatterpipeError, Result};

use super::ir::{OutputFormat, TemplateConfig, TemplateIr, TemplateSource};

/// A `{dotted.path}` placeholder. Paths start with an identifier or index
/// character and may contain dots, dashes, and underscores; this keeps the
/// pattern from matching the braces of surrounding JSON text.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[A-Za-z0-9_][A-Za-z0-9_.\-]*\}").expect("placeholder pattern is valid")
});

/// Timestamp format applied to every RFC 3339 string the renderer touches.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Renders a [`TemplateIr`] to output text.
///
/// Holds only the base directory that file-backed template sources are
/// resolved against; all per-render behavior comes from the IR itself.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    base_dir: PathBuf,
}

impl TemplateRenderer {
    /// A renderer resolving file templates against the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer resolving file templates against `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Render the IR to final output text.
    ///
    /// # Errors
    ///
    /// [`MatterpipeError::TemplateNotFound`] when a file-backed template does
    /// not exist, [`MatterpipeError::MissingVariable`] under strict variables,
    /// and [`MatterpipeError::Render`] for serialization failures.
    pub async fn render(&self, ir: &TemplateIr) -> Result<String> {
        let text = self.load_source(&ir.main_template).await?;
        let context = render_context(ir);

        match serde_json::from_str::<Value>(&text) {
            Ok(tree) => {
                let substituted = substitute_tree(&tree, &context, ir.template_config)?;
                serialize_tree(&substituted, ir.output_format)
            }
            Err(_) => interpolate(&text, &context, ir.template_config),
        }
    }

    async fn load_source(&self, source: &TemplateSource) -> Result<String> {
        match source {
            TemplateSource::Inline(text) => Ok(text.clone()),
            TemplateSource::File(path) => {
                let full = self.base_dir.join(path);
                match tokio::fs::read_to_string(&full).await {
                    Ok(text) => Ok(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(MatterpipeError::TemplateNotFound {
                            path: full.display().to_string(),
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Build the lookup context for one render: the main context, with the
/// pre-rendered items array exposed under `items` when the context does not
/// already carry that key.
fn render_context(ir: &TemplateIr) -> Value {
    let mut context = ir.main_context.clone();
    if let (Some(items), Value::Object(map)) = (&ir.items_array, &mut context) {
        map.entry("items").or_insert_with(|| Value::Array(items.clone()));
    }
    context
}

fn serialize_tree(tree: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(tree).map_err(|e| {
            MatterpipeError::Render { reason: format!("JSON serialization failed: {e}") }
        }),
        OutputFormat::Yaml => serde_yaml::to_string(tree).map_err(|e| {
            MatterpipeError::Render { reason: format!("YAML serialization failed: {e}") }
        }),
        // Text formats: a template that substituted down to a single string
        // is that string; any other shape falls back to pretty JSON.
        OutputFormat::Markdown | OutputFormat::Xml => match tree {
            Value::String(text) => Ok(text.clone()),
            other => serde_json::to_string_pretty(other).map_err(|e| {
                MatterpipeError::Render { reason: format!("serialization failed: {e}") }
            }),
        },
    }
}

/// Substitute placeholders through a parsed JSON template tree.
///
/// A string node that is entirely one `{path}` becomes the typed resolved
/// value; strings with surrounding text are interpolated; objects and arrays
/// recurse. Non-string scalars pass through untouched.
pub fn substitute_tree(node: &Value, data: &Value, config: TemplateConfig) -> Result<Value> {
    match node {
        Value::String(text) => {
            if let Some(path) = whole_placeholder(text) {
                return match lookup(data, path) {
                    Some(value) => Ok(normalize_value(value)),
                    None if config.strict_variables => {
                        Err(MatterpipeError::MissingVariable { variable: path.to_string() })
                    }
                    None => Ok(Value::String(text.clone())),
                };
            }
            Ok(Value::String(interpolate(text, data, config)?))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute_tree(item, data, config)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), substitute_tree(value, data, config)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Interpolate `{dotted.path}` placeholders into plain text.
///
/// Unresolvable placeholders stay in place unless
/// [`TemplateConfig::strict_variables`] is set.
pub fn interpolate(template: &str, data: &Value, config: TemplateConfig) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for found in PLACEHOLDER.find_iter(template) {
        out.push_str(&template[last..found.start()]);
        let raw = found.as_str();
        let path = &raw[1..raw.len() - 1];
        match lookup(data, path) {
            Some(value) => out.push_str(&scalar_text(value, config.escape_html)),
            None if config.strict_variables => {
                return Err(MatterpipeError::MissingVariable { variable: path.to_string() });
            }
            None => out.push_str(raw),
        }
        last = found.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Resolve a dotted path into a value tree. Numeric segments index arrays.
fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// The path inside a string that is entirely one placeholder, if any.
fn whole_placeholder(text: &str) -> Option<&str> {
    let found = PLACEHOLDER.find(text)?;
    if found.start() == 0 && found.end() == text.len() {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Typed substitution result: timestamps normalized, everything else cloned.
fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(normalize_date(text)),
        other => other.clone(),
    }
}

fn scalar_text(value: &Value, escape_html: bool) -> String {
    let text = match value {
        Value::String(text) => normalize_date(text),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Composite values inside text interpolation serialize compactly.
        other => other.to_string(),
    };
    if escape_html { escape(&text) } else { text }
}

/// RFC 3339 strings collapse to one fixed UTC format; anything else passes
/// through untouched.
fn normalize_date(text: &str) -> String {
    match DateTime::parse_from_rfc3339(text) {
        Ok(parsed) => parsed.naive_utc().format(DATE_FORMAT).to_string(),
        Err(_) => text.to_string(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Convenience: render inline template text directly, detecting JSON shape
/// the same way [`TemplateRenderer::render`] does. Used by callers that hold
/// raw text rather than a full IR.
pub fn render_text(template: &str, data: &Value, config: TemplateConfig) -> Result<String> {
    match serde_json::from_str::<Value>(template) {
        Ok(tree) => {
            let substituted = substitute_tree(&tree, data, config)?;
            serialize_tree(&substituted, OutputFormat::Json)
        }
        Err(_) => interpolate(template, data, config),
    }
}
