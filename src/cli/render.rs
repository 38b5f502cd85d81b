//! The `render` command: the full document-to-output flow.
//!
//! Loads the registry configuration, resolves the schema (following `$ref`
//! nodes through the cache), parses document frontmatter, expands part
//! boundaries, runs the directive pipeline, and renders the resulting
//! template IR.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config;
use crate::document;
use crate::pipeline::{DirectivePipeline, part_property};
use crate::schema::{Schema, SchemaCache, SchemaResolver};
use crate::template::{
    IrMetadata, OutputFormat, TemplateConfig, TemplateIrBuilder, TemplateRenderer, TemplateSource,
};

/// Arguments for `matterpipe render`.
#[derive(Args)]
pub struct RenderCommand {
    /// Schema file declaring the directives
    #[arg(long)]
    schema: PathBuf,

    /// Document file, or a directory of documents processed as one batch
    #[arg(long)]
    docs: PathBuf,

    /// Inline template text overriding the schema's template directive
    #[arg(long)]
    template: Option<String>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Output format override: json, yaml, markdown, or xml
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Registry configuration file (YAML or JSON)
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Fail on unresolved template variables instead of leaving them in place
    #[arg(long)]
    strict: bool,

    /// HTML-escape interpolated string values
    #[arg(long)]
    escape_html: bool,
}

impl RenderCommand {
    /// Execute the render flow end to end.
    pub async fn execute(self) -> Result<()> {
        let (registry, keys) = config::load_registry(self.registry.as_deref()).await?;
        let pipeline = DirectivePipeline::new(registry, keys.clone());

        let schema = Schema::load(&self.schema).await?;
        let resolver = SchemaResolver::new(Arc::new(SchemaCache::default()));
        let resolved = resolver.resolve(&schema.definition, &self.schema).await?;

        let documents = if self.docs.is_dir() {
            document::load_documents(&self.docs).await?
        } else {
            vec![document::load_document(&self.docs).await?]
        };
        if documents.is_empty() {
            anyhow::bail!("no documents found under {}", self.docs.display());
        }

        let part = part_property(&resolved, &keys)?;
        let mut batch = Vec::new();
        for doc in &documents {
            match &part {
                Some(part) => batch.extend(document::expand_parts(&doc.data, part)),
                None => batch.push(doc.data.clone()),
            }
        }

        // A single document is transformed in place; a batch aggregates into
        // a fresh output document.
        let result = if batch.len() == 1 {
            pipeline.run_document(batch[0].clone(), &batch, &resolved)
        } else {
            pipeline.run_batch(&batch, &resolved)
        };
        let run = result.map_err(|failure| anyhow::Error::from(failure.error))?;

        let mut plan = run.render_plan;
        if let Some(format) = self.format {
            plan.output_format = Some(format);
        }
        plan.output_format.get_or_insert_with(OutputFormat::default);
        if let Some(text) = self.template {
            plan.main_template = Some(TemplateSource::Inline(text));
        }

        let ir = TemplateIrBuilder::from_plan(plan)
            .with_main_context(run.data)
            .with_template_config(TemplateConfig {
                strict_variables: self.strict,
                escape_html: self.escape_html,
            })
            .with_metadata(IrMetadata {
                stage: "render".to_string(),
                schema_path: self.schema.clone(),
                source_files: documents.iter().map(|d| d.path.clone()).collect(),
            })
            .build()?;

        let renderer = match self.schema.parent() {
            Some(dir) if dir.as_os_str().is_empty() => TemplateRenderer::new(),
            Some(dir) => TemplateRenderer::with_base_dir(dir),
            None => TemplateRenderer::new(),
        };
        let output = renderer.render(&ir).await?;

        match self.out {
            Some(path) => {
                tokio::fs::write(&path, &output)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("{} {}", "Rendered".green().bold(), path.display());
            }
            None => println!("{output}"),
        }
        Ok(())
    }
}
