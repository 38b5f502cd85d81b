//! Staged directive pipeline.
//!
//! Drives the registry's processing order over a resolved schema: for each
//! directive, every schema property is scanned for that directive's extension
//! key; present annotations are extracted and applied, threading each
//! handler's output data into the next step's input. The first extraction or
//! processing error fails the whole run, carrying the originating directive
//! name, the partially transformed data, and the trail reached so far.
//!
//! A run is atomic from the caller's point of view: it either yields a
//! [`PipelineRun`] or a [`PipelineFailure`], never a half-committed mix.

use serde_json::{Map, Value};

use crate::core::{MatterpipeError, Result};
use crate::directives::handlers::{self, StepContext};
use crate::directives::{DirectiveKeys, DirectiveKind, DirectiveRegistry};
use crate::schema::properties_of;
use crate::template::ir::RenderPlan;

/// Outcome of one directive for one run, recorded on the trail.
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// The directive's annotation was absent from every schema property.
    Skipped,
    /// The directive fired on the named property.
    Applied {
        /// Schema property the annotation was found on.
        property: String,
        /// Handler-reported metrics.
        metrics: Value,
    },
}

/// One trail entry: which directive ran, at what stage, with what outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveTrace {
    /// Directive name.
    pub directive: String,
    /// The directive's stage at the time of the run.
    pub stage: i64,
    /// What happened.
    pub status: StepStatus,
}

/// A completed run: final data, the full trail, and accumulated render state.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Document data after every directive has been applied.
    pub data: Value,
    /// Per-directive outcomes in processing order.
    pub trail: Vec<DirectiveTrace>,
    /// Render state contributed by the template directives.
    pub render_plan: RenderPlan,
}

/// A failed run: the directive that failed, why, and what had been reached.
///
/// The partial data is diagnostic only; it is never usable as output.
#[derive(Debug)]
pub struct PipelineFailure {
    /// Name of the directive whose extract or process step failed.
    pub directive: String,
    /// The underlying error.
    pub error: MatterpipeError,
    /// Data as it stood when the failure occurred.
    pub partial_data: Value,
    /// Trail up to (not including) the failed directive.
    pub trail: Vec<DirectiveTrace>,
}

impl PipelineFailure {
    fn boxed(
        directive: &str,
        error: MatterpipeError,
        partial_data: Value,
        trail: Vec<DirectiveTrace>,
    ) -> Box<Self> {
        Box::new(Self { directive: directive.to_string(), error, partial_data, trail })
    }
}

/// Result alias for pipeline runs; the failure side is boxed because it
/// carries the full partial data tree.
pub type RunResult = std::result::Result<PipelineRun, Box<PipelineFailure>>;

/// Applies registered directives to document data in stage order.
///
/// Stateless between runs; one pipeline may serve any number of documents
/// and may be shared across concurrent per-document runs.
#[derive(Debug, Clone, Default)]
pub struct DirectivePipeline {
    registry: DirectiveRegistry,
    keys: DirectiveKeys,
}

impl DirectivePipeline {
    /// A pipeline over the given registry and extension key mapping.
    #[must_use]
    pub fn new(registry: DirectiveRegistry, keys: DirectiveKeys) -> Self {
        Self { registry, keys }
    }

    /// The registry this pipeline executes.
    #[must_use]
    pub fn registry(&self) -> &DirectiveRegistry {
        &self.registry
    }

    /// Run every registered directive against one document's data.
    ///
    /// `batch` is the full set of documents the run belongs to, consulted
    /// read-only by cross-document directives; `schema` must already be
    /// reference-resolved.
    pub fn run_document(&self, data: Value, batch: &[Value], schema: &Value) -> RunResult {
        let empty = Map::new();
        let properties = properties_of(schema).unwrap_or(&empty);

        let mut current = data;
        let mut trail = Vec::new();
        let mut plan = RenderPlan::default();

        for config in self.registry.processing_order() {
            let kind = match config.name.parse::<DirectiveKind>() {
                Ok(kind) => kind,
                // Unreachable for a validated registry, but the parse is the
                // single place name strings become kinds, so surface it.
                Err(e) => return Err(PipelineFailure::boxed(&config.name, e, current, trail)),
            };

            let mut fired = false;
            for (property, schema_property) in properties {
                let payload =
                    match handlers::extract_config(kind, &self.keys, property, schema_property) {
                        Ok(Some(payload)) => payload,
                        Ok(None) => continue,
                        Err(e) => {
                            return Err(PipelineFailure::boxed(&config.name, e, current, trail));
                        }
                    };

                let ctx = StepContext { data: &current, batch, property };
                match handlers::process(&payload, ctx, &mut plan) {
                    Ok(output) => {
                        tracing::debug!(
                            directive = %config.name,
                            property,
                            "directive applied"
                        );
                        current = output.data;
                        trail.push(DirectiveTrace {
                            directive: config.name.clone(),
                            stage: config.stage,
                            status: StepStatus::Applied {
                                property: property.to_string(),
                                metrics: output.metrics,
                            },
                        });
                        fired = true;
                    }
                    Err(e) => {
                        return Err(PipelineFailure::boxed(&config.name, e, current, trail));
                    }
                }
            }

            if !fired {
                trail.push(DirectiveTrace {
                    directive: config.name.clone(),
                    stage: config.stage,
                    status: StepStatus::Skipped,
                });
            }
        }

        Ok(PipelineRun { data: current, trail, render_plan: plan })
    }

    /// Run a whole batch through the schema, starting from an empty document.
    ///
    /// Used when the output is an aggregate over the batch (derived arrays,
    /// item templates) rather than a transform of any single document.
    pub fn run_batch(&self, batch: &[Value], schema: &Value) -> RunResult {
        self.run_document(Value::Object(Map::new()), batch, schema)
    }
}

/// Resolve the property marked as the expansion boundary, if any.
///
/// This is the consumer of the advisory frontmatter-part flag: it lives
/// outside the handler because expansion happens before the pipeline runs.
pub fn part_property(schema: &Value, keys: &DirectiveKeys) -> Result<Option<String>> {
    let Some(properties) = properties_of(schema) else {
        return Ok(None);
    };
    let key = keys.key_for(DirectiveKind::FrontmatterPart);
    let mut found = None;
    for (property, schema_property) in properties {
        let Some(flag) = schema_property.get(key) else {
            continue;
        };
        if flag.as_bool() != Some(true) {
            continue;
        }
        if let Some(first) = &found {
            return Err(MatterpipeError::validation(
                DirectiveKind::FrontmatterPart.name(),
                property,
                format!("part boundary already declared on property '{first}'"),
            ));
        }
        found = Some(property.clone());
    }
    Ok(found)
}
