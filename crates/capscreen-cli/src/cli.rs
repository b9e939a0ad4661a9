//! CLI argument definitions for capscreen.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `screen` | Score a list of symbols (or the configured universe) and rank them |
//! | `score` | Factor-by-factor breakdown for one symbol |
//! | `universe` | List the configured universe |
//! | `rubric` | Print the effective scoring rubric |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML configuration file |
//! | `--format` | `table` | Output format (table, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use deterministic offline data |
//! | `--strict` | `false` | Any failed symbol exits with code 5 |
//! | `--concurrency` | config | Max concurrent fetches |
//! | `--timeout-ms` | config | Batch deadline in milliseconds |
//!
//! # Examples
//!
//! ```bash
//! capscreen screen
//! capscreen screen AAON ABCB AMWD --format json --pretty
//! capscreen score ANIK --mock
//! capscreen --config capscreen.toml rubric
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Small-cap value screener.
#[derive(Debug, Parser)]
#[command(
    name = "capscreen",
    author,
    version,
    about = "Score small-cap equities on a fundamentals rubric",
    long_about = "capscreen fetches market cap, P/E, P/B, debt-to-equity and profit margin \
for each symbol concurrently, scores them on a 0-100 value rubric, and prints a ranked table.\n\
\n\
Symbols that cannot be evaluated are listed separately; they never abort the run."
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Use deterministic offline fundamentals instead of Yahoo Finance.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Treat any symbol failure as fatal (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Maximum number of concurrent fetches.
    #[arg(long, global = true, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Deadline for the whole batch in milliseconds (0 disables it).
    #[arg(long, global = true, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Table,
    /// Single JSON report object.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score and rank symbols.
    ///
    /// With no symbols, the configured universe is screened.
    ///
    ///   capscreen screen
    ///   capscreen screen AAON ABCB --format json
    Screen(ScreenArgs),

    /// Show the factor breakdown for one symbol.
    Score(ScoreArgs),

    /// List the configured universe.
    Universe,

    /// Print the effective rubric.
    Rubric,
}

/// Arguments for the `screen` command.
#[derive(Debug, Args)]
pub struct ScreenArgs {
    /// Ticker symbols; defaults to the configured universe.
    pub symbols: Vec<String>,
}

/// Arguments for the `score` command.
#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Ticker symbol.
    pub symbol: String,
}
