//! # tiergraf CLI Module
//!
//! ## Available Commands
//!
//! - `convert` - Build a document from a JSON source and save it
//! - `hierarchy` - Print the inferred tier hierarchy
//! - `status` - Show graph counts
//! - `table` - Render interlinear tables (HTML or text)
//! - `filter` - Evaluate per-tier patterns over the elements
//!
//! Every command reads either a nested JSON source or a snapshot written by
//! `convert`; the format is recognised from the file's leading bytes.

mod commands;
pub mod config;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tiergraf_core::{BooleanMode, GrafError};

pub use commands::*;
pub use config::{Config, LogFormat};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// tiergraf - standoff graphs for tiered linguistic annotations
///
/// Converts interlinear and time-aligned annotation sources into annotation
/// graphs, lays them out as tables and filters them by tier.
#[derive(Parser, Debug)]
#[command(name = "tiergraf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (log warnings and errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a configuration file (default: ./tiergraf.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Snapshot or JSON export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConvertFormat {
    Snapshot,
    Json,
}

/// HTML tables or a text grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableFormat {
    Html,
    Text,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a source into a snapshot or a JSON export
    Convert {
        /// Input file (nested JSON source or snapshot)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(short = 't', long, value_enum, default_value = "snapshot")]
        format: ConvertFormat,
    },

    /// Print the inferred tier hierarchy
    Hierarchy {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show graph status
    Status {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Render every root element as a table
    Table {
        #[arg(short, long)]
        input: PathBuf,

        /// Tier heading the hierarchy to lay out
        #[arg(short, long)]
        root_tier: Option<String>,

        #[arg(short = 't', long, value_enum, default_value = "html")]
        format: TableFormat,

        /// Emit bare <table> elements without the page wrapper
        #[arg(long, overrides_with = "full_html")]
        fragment: bool,

        /// Wrap the tables in a complete HTML page
        #[arg(long, overrides_with = "fragment")]
        full_html: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Filter root elements by per-tier patterns
    Filter {
        #[arg(short, long)]
        input: PathBuf,

        /// Tier heading the hierarchy to filter
        #[arg(short, long)]
        root_tier: Option<String>,

        /// Pattern for one tier, as tier=regex (repeatable)
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,

        /// Combine tiers with OR
        #[arg(long, overrides_with = "and")]
        or: bool,

        /// Combine tiers with AND
        #[arg(long, overrides_with = "or")]
        and: bool,

        /// Keep the elements that do not match
        #[arg(long, overrides_with = "no_invert")]
        invert: bool,

        /// Keep the elements that match
        #[arg(long, overrides_with = "invert")]
        no_invert: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Run the parsed command and return what it prints.
pub fn execute(cli: &Cli, config: &Config) -> Result<String, GrafError> {
    let json_mode = cli.json_mode;

    match &cli.command {
        Commands::Convert {
            input,
            output,
            format,
        } => cmd_convert(input, output, *format, cli.quiet),
        Commands::Hierarchy { input } => cmd_hierarchy(input, json_mode),
        Commands::Status { input } => cmd_status(input, json_mode),
        Commands::Table {
            input,
            root_tier,
            format,
            fragment,
            full_html,
            output,
        } => {
            let settings = TableSettings {
                root_tier: root_tier.clone().or_else(|| config.root_tier.clone()),
                format: *format,
                full_html: switch(*full_html, *fragment).unwrap_or(config.full_html),
            };
            cmd_table(input, &settings, output.as_deref())
        }
        Commands::Filter {
            input,
            root_tier,
            patterns,
            or,
            and,
            invert,
            no_invert,
        } => {
            let settings = FilterSettings {
                root_tier: root_tier.clone().or_else(|| config.root_tier.clone()),
                patterns: patterns
                    .iter()
                    .map(|p| parse_pattern(p))
                    .collect::<Result<_, _>>()?,
                mode: match switch(*or, *and) {
                    Some(true) => BooleanMode::Or,
                    Some(false) => BooleanMode::And,
                    None => config.boolean_mode,
                },
                inverted: switch(*invert, *no_invert).unwrap_or(config.inverted),
            };
            cmd_filter(input, &settings, json_mode)
        }
    }
}

/// Resolve an on/off flag pair; `None` when neither was given.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Default log directive for the verbosity flags.
pub fn log_directive(cli: &Cli) -> &'static str {
    if cli.verbose {
        "tiergraf=debug"
    } else if cli.quiet {
        "tiergraf=warn"
    } else {
        "tiergraf=info"
    }
}

/// Split `tier=regex` at the first `=`.
pub fn parse_pattern(arg: &str) -> Result<(String, String), GrafError> {
    match arg.split_once('=') {
        Some((tier, pattern)) if !tier.is_empty() => Ok((tier.to_string(), pattern.to_string())),
        _ => Err(GrafError::InvalidPattern {
            tier: arg.to_string(),
            message: "expected tier=regex".to_string(),
        }),
    }
}
