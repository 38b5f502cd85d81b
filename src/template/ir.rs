//! Template intermediate representation
//!
//! The IR is the immutable bridge between directive processing and rendering:
//! it normalizes the pipeline's output (template sources, output format,
//! variable context, rendered items, provenance metadata) into one structure
//! the renderer consumes without looking back at the schema.
//!
//! [`TemplateIrBuilder`] accumulates fields through `with_*` setters and
//! validates only at [`build`](TemplateIrBuilder::build), collecting *all*
//! missing-field errors in one pass rather than failing on the first, which
//! gives schema authors every problem at once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::{MatterpipeError, Result};

/// Where template text comes from: embedded in the schema or a file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Template text carried inline in the schema annotation.
    Inline(String),
    /// Path to a template file, resolved at render time.
    File(PathBuf),
}

/// Target serialization format for rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default).
    #[default]
    Json,
    /// YAML output; JSON templates are re-serialized through YAML.
    Yaml,
    /// Markdown text output.
    Markdown,
    /// XML text output.
    Xml,
}

impl OutputFormat {
    /// Every supported format tag.
    pub const ALL: [Self; 4] = [Self::Json, Self::Yaml, Self::Markdown, Self::Xml];

    /// The lowercase tag used in schema annotations.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for OutputFormat {
    type Err = MatterpipeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|format| format.tag() == s).ok_or_else(|| {
            MatterpipeError::Render {
                reason: format!(
                    "unknown output format '{s}' (expected json, yaml, markdown, or xml)"
                ),
            }
        })
    }
}

/// Renderer behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemplateConfig {
    /// Fail on unresolvable placeholders instead of preserving them.
    pub strict_variables: bool,
    /// HTML-escape interpolated string values.
    pub escape_html: bool,
}

/// Mutable render state accumulated by the template directives during a
/// pipeline run; seeds the [`TemplateIrBuilder`] once the run completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPlan {
    /// Main template bound by the template directive.
    pub main_template: Option<TemplateSource>,
    /// Item template bound by the template-items directive.
    pub items_template: Option<String>,
    /// Output format recorded by the template-format directive.
    pub output_format: Option<OutputFormat>,
    /// Items rendered by the template-items directive.
    pub items: Option<Vec<Value>>,
    /// Placeholder-to-source-path mappings contributed by directives.
    pub variable_mappings: BTreeMap<String, String>,
}

/// Provenance metadata carried on the IR for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrMetadata {
    /// Human label for the pipeline stage that produced this IR.
    pub stage: String,
    /// Schema the render was driven by.
    pub schema_path: PathBuf,
    /// Documents that contributed data.
    pub source_files: Vec<PathBuf>,
}

/// The immutable render input. Built exactly once per render.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateIr {
    /// Main template source.
    pub main_template: TemplateSource,
    /// Optional per-item template.
    pub items_template: Option<String>,
    /// Output serialization format.
    pub output_format: OutputFormat,
    /// Variable context the renderer resolves placeholders against.
    pub main_context: Value,
    /// Pre-rendered items, when template-items fired.
    pub items_array: Option<Vec<Value>>,
    /// Renderer behavior switches.
    pub template_config: TemplateConfig,
    /// Placeholder-to-source-path mappings.
    pub variable_mappings: BTreeMap<String, String>,
    /// Provenance metadata.
    pub metadata: IrMetadata,
}

/// Accumulating builder for [`TemplateIr`].
#[derive(Debug, Default)]
pub struct TemplateIrBuilder {
    main_template: Option<TemplateSource>,
    items_template: Option<String>,
    output_format: Option<OutputFormat>,
    main_context: Option<Value>,
    items_array: Option<Vec<Value>>,
    template_config: Option<TemplateConfig>,
    variable_mappings: BTreeMap<String, String>,
    metadata: IrMetadata,
}

impl TemplateIrBuilder {
    /// Start from an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from a pipeline's accumulated render plan.
    #[must_use]
    pub fn from_plan(plan: RenderPlan) -> Self {
        Self {
            main_template: plan.main_template,
            items_template: plan.items_template,
            output_format: plan.output_format,
            items_array: plan.items,
            variable_mappings: plan.variable_mappings,
            ..Self::default()
        }
    }

    /// Set the main template source (required).
    #[must_use]
    pub fn with_main_template(mut self, source: TemplateSource) -> Self {
        self.main_template = Some(source);
        self
    }

    /// Set the per-item template.
    #[must_use]
    pub fn with_items_template(mut self, template: impl Into<String>) -> Self {
        self.items_template = Some(template.into());
        self
    }

    /// Set the output format (required).
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Set the variable context the renderer resolves against.
    #[must_use]
    pub fn with_main_context(mut self, context: Value) -> Self {
        self.main_context = Some(context);
        self
    }

    /// Set the pre-rendered items array.
    #[must_use]
    pub fn with_items_array(mut self, items: Vec<Value>) -> Self {
        self.items_array = Some(items);
        self
    }

    /// Set the renderer configuration (required).
    #[must_use]
    pub fn with_template_config(mut self, config: TemplateConfig) -> Self {
        self.template_config = Some(config);
        self
    }

    /// Add one placeholder-to-source-path mapping.
    #[must_use]
    pub fn with_variable_mapping(
        mut self,
        placeholder: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.variable_mappings.insert(placeholder.into(), source.into());
        self
    }

    /// Set provenance metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: IrMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate and build the immutable IR.
    ///
    /// # Errors
    ///
    /// [`MatterpipeError::IrBuildFailed`] naming every required field that was
    /// not set: `main_template`, `output_format`, `template_config`.
    pub fn build(self) -> Result<TemplateIr> {
        let mut missing = Vec::new();
        if self.main_template.is_none() {
            missing.push("main_template".to_string());
        }
        if self.output_format.is_none() {
            missing.push("output_format".to_string());
        }
        if self.template_config.is_none() {
            missing.push("template_config".to_string());
        }
        if !missing.is_empty() {
            return Err(MatterpipeError::IrBuildFailed { missing });
        }

        // The unwraps cannot fire: the missing-field pass above returned
        // early unless every required field is present.
        Ok(TemplateIr {
            main_template: self.main_template.unwrap(),
            items_template: self.items_template,
            output_format: self.output_format.unwrap(),
            main_context: self.main_context.unwrap_or_else(|| Value::Object(Default::default())),
            items_array: self.items_array,
            template_config: self.template_config.unwrap(),
            variable_mappings: self.variable_mappings,
            metadata: self.metadata,
        })
    }
}
