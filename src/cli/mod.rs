//! Command-line interface for matterpipe.
//!
//! Each command lives in its own module with its own argument structure and
//! execution logic:
//!
//! - `render` - run documents through a schema's directives and render output
//! - `order` - show the directive processing order
//! - `check` - resolve a schema and validate its directive annotations
//!
//! Global options (`--verbose`, `--quiet`) control logging verbosity for all
//! subcommands.

mod check;
mod order;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Top-level CLI: global flags plus one subcommand.
#[derive(Parser)]
#[command(
    name = "matterpipe",
    about = "Directive-driven document transformation and templating",
    version,
    author,
    long_about = "Matterpipe reads frontmatter documents, applies the transformation \
directives declared in an extended JSON schema, and renders the result through a template."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Transform documents through a schema's directives and render output
    Render(render::RenderCommand),
    /// Show the directive processing order
    Order(order::OrderCommand),
    /// Resolve a schema and validate its directive annotations
    Check(check::CheckCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        match self.command {
            Commands::Render(cmd) => cmd.execute().await,
            Commands::Order(cmd) => cmd.execute().await,
            Commands::Check(cmd) => cmd.execute().await,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("warn")
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Cli::try_parse_from(["matterpipe", "--verbose", "--quiet", "order"]);
        assert!(result.is_err());
    }
}
