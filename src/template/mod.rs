//! Template intermediate representation and rendering.
//!
//! The pipeline's template directives accumulate a [`ir::RenderPlan`]; the
//! [`ir::TemplateIrBuilder`] freezes that plan (plus the final document data)
//! into an immutable [`ir::TemplateIr`], which the [`renderer::TemplateRenderer`]
//! turns into output text.

pub mod ir;
pub mod renderer;

pub use ir::{
    IrMetadata, OutputFormat, RenderPlan, TemplateConfig, TemplateIr, TemplateIrBuilder,
    TemplateSource,
};
pub use renderer::TemplateRenderer;
