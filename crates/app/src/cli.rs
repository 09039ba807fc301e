use rust_decimal::Decimal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_core::ExpenseType;

/// Tally - bank statement import and merchant tagging
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Imports bank statements and learns how to tag them", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (config.toml, keywords.toml, tally.db). Defaults to the
    /// platform data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preview a statement import, and write it with --confirm
    Import {
        /// Statement file (CSV, spreadsheet or PDF)
        file: PathBuf,

        /// Insert the new rows after the preview
        #[arg(long)]
        confirm: bool,
    },

    /// List stored transactions
    List {
        /// Only this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,

        /// Only transactions without a tag
        #[arg(long)]
        untagged: bool,
    },

    /// Suggest a tag for a label
    Classify {
        label: String,

        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
    },

    /// Correct the tag of a stored transaction and learn from it
    Correct {
        /// Transaction id, as printed by `list`
        id: String,

        tag: String,

        /// fixed or variable
        #[arg(long)]
        expense_type: Option<ExpenseType>,
    },

    /// Classify and tag every untagged transaction
    TagUntagged,

    /// Delete stored rows that duplicate an earlier row
    Dedup,

    /// Per-tag totals over non-excluded transactions
    Stats,

    /// Show learned patterns
    Patterns,
}
