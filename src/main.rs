//! Matterpipe CLI entry point.
//!
//! Handles argument parsing, error display, and command execution. The
//! commands themselves live in [`matterpipe::cli`]:
//! - `render` - transform documents through a schema and render output
//! - `order` - show the directive processing order
//! - `check` - resolve a schema and validate its directive annotations

use anyhow::Result;
use clap::Parser;
use matterpipe::cli;
use matterpipe::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
