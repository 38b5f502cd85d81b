//! The `check` command: resolve a schema and validate its annotations.
//!
//! Resolution surfaces circular or dangling `$ref` chains; extraction
//! surfaces malformed directive annotations, all without touching any
//! document data.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config;
use crate::directives::DirectiveKind;
use crate::directives::handlers;
use crate::schema::{Schema, SchemaCache, SchemaResolver, properties_of};

/// Arguments for `matterpipe check`.
#[derive(Args)]
pub struct CheckCommand {
    /// Schema file to check
    schema: PathBuf,

    /// Registry configuration file (YAML or JSON)
    #[arg(long)]
    registry: Option<PathBuf>,
}

impl CheckCommand {
    /// Resolve the schema and validate every directive annotation on it.
    pub async fn execute(self) -> Result<()> {
        let (_, keys) = config::load_registry(self.registry.as_deref()).await?;

        let schema = Schema::load(&self.schema).await?;
        let resolver = SchemaResolver::new(Arc::new(SchemaCache::default()));
        let resolved = resolver.resolve(&schema.definition, &self.schema).await?;

        let mut annotations = 0;
        if let Some(properties) = properties_of(&resolved) {
            for (property, schema_property) in properties {
                for kind in DirectiveKind::ALL {
                    if handlers::extract_config(kind, &keys, property, schema_property)?.is_some() {
                        println!("  {property}: {kind}");
                        annotations += 1;
                    }
                }
            }
        }

        println!(
            "{} {} ({annotations} directive annotation{})",
            "OK".green().bold(),
            self.schema.display(),
            if annotations == 1 { "" } else { "s" }
        );
        Ok(())
    }
}
