//! The `order` command: show the directive processing order.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config;

/// Arguments for `matterpipe order`.
#[derive(Args)]
pub struct OrderCommand {
    /// Registry configuration file (YAML or JSON)
    #[arg(long)]
    registry: Option<PathBuf>,
}

impl OrderCommand {
    /// Print the registered directives in stage order.
    pub async fn execute(self) -> Result<()> {
        let (registry, keys) = config::load_registry(self.registry.as_deref()).await?;

        for config in registry.processing_order() {
            println!(
                "{:>5}  {:<18} {}",
                config.stage,
                config.name.bold(),
                config.description
            );
            if let Ok(kind) = config.name.parse::<crate::directives::DirectiveKind>() {
                println!("       key: {}", keys.key_for(kind).dimmed());
            }
            if !config.depends_on.is_empty() {
                println!("       depends on: {}", config.depends_on.join(", ").dimmed());
            }
        }
        Ok(())
    }
}
