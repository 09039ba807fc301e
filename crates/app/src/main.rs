//! Tally CLI
//!
//! Usage:
//!   tally import FILE [--confirm]     Preview (and insert) a bank statement
//!   tally classify LABEL AMOUNT       Suggest a tag
//!   tally correct ID TAG              Fix a tag and learn from it
//!   tally tag-untagged                Tag everything still untagged

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tally::AppContext;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose, which wins over the default.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => directories::ProjectDirs::from("org", "tally", "Tally")
            .context("no home directory to place the data directory in")?
            .data_dir()
            .to_path_buf(),
    };
    let ctx = AppContext::open(&data_dir).await?;

    match cli.command {
        Commands::Import { file, confirm } => commands::cmd_import(&ctx, &file, confirm).await,
        Commands::List { month, untagged } => commands::cmd_list(&ctx, month.as_deref(), untagged).await,
        Commands::Classify { label, amount } => commands::cmd_classify(&ctx, &label, amount).await,
        Commands::Correct {
            id,
            tag,
            expense_type,
        } => commands::cmd_correct(&ctx, &id, &tag, expense_type).await,
        Commands::TagUntagged => commands::cmd_tag_untagged(&ctx).await,
        Commands::Dedup => commands::cmd_dedup(&ctx).await,
        Commands::Stats => commands::cmd_stats(&ctx).await,
        Commands::Patterns => commands::cmd_patterns(&ctx),
    }
}
