//! CLI arguments and subcommands for smaps-analyzer.
//!
//! Global flags (config, logging, verbosity) apply to every subcommand; each
//! subcommand takes its source files plus an optional output path.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "smaps-analyzer",
    about = "Offline analyzer for per-process smaps snapshots",
    long_about = "Offline analyzer for per-process smaps snapshots.\n\n\
                  Flattens thread records into processes, normalizes captures to CSV, \
                  aggregates memory per application and per mapped object into an HTML \
                  report, and ranks differences between several snapshots.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Report more diagnostics (repeatable)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Report fewer diagnostics (repeatable)
    #[arg(short = 'q', long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Report no diagnostics at all
    #[arg(short = 's', long, global = true)]
    pub silent: bool,

    /// Parallel processing threads (0 = auto)
    #[arg(long, global = true)]
    pub parallelism: Option<usize>,
}

/// Source files and the optional output path shared by every command.
#[derive(ClapArgs, Debug, Clone)]
pub struct SourceArgs {
    /// Input files (.cap/.flat raw captures, .csv normalized data)
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Output path (applies to the first source only)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Subcommands for the analysis pipeline
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fold thread records into their processes and write raw captures
    Flatten {
        #[command(flatten)]
        io: SourceArgs,
    },

    /// Convert captures into normalized CSV
    Normalize {
        #[command(flatten)]
        io: SourceArgs,
    },

    /// Aggregate and write the HTML report
    Analyze {
        #[command(flatten)]
        io: SourceArgs,

        /// Target rows per page in long report tables
        #[arg(long)]
        page_rows: Option<usize>,

        /// Copy-on-write estimate used by aggregation
        #[arg(long, value_enum)]
        cow_policy: Option<CowPolicyArg>,
    },

    /// Write the per-application summary CSV
    Appvals {
        #[command(flatten)]
        io: SourceArgs,

        /// Copy-on-write estimate used by aggregation
        #[arg(long, value_enum)]
        cow_policy: Option<CowPolicyArg>,
    },

    /// Rank memory differences between snapshots
    Diff {
        /// Snapshots to compare, in order
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Output path (stdout when absent)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Detail level 0..4: system, command, pid, type, path
        #[arg(short = 'l', long, allow_negative_numbers = true)]
        level: Option<i64>,

        /// Minimum rank of reported rows
        #[arg(short = 'r', long)]
        min_rank: Option<f64>,

        /// Output mode: csv or html
        #[arg(short = 'm', long)]
        mode: Option<String>,

        /// Blank repeated keys and separate commands (1/0/yes/no/true/false)
        #[arg(short = 'e', long, value_parser = parse_flag)]
        filtered_output: Option<bool>,

        /// Skip these commands (comma-separated)
        #[arg(long)]
        exclude: Option<String>,

        /// Copy-on-write estimate used by the diff
        #[arg(long, value_enum)]
        cow_policy: Option<CowPolicyArg>,
    },

    /// Generate a configuration file
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments
        #[arg(long)]
        commented: bool,
    },
}

/// Copy-on-write policy as a CLI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CowPolicyArg {
    Recorded,
    SharedWritable,
}

/// Boolean values accepted by `--filtered-output`.
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        other => Err(format!("expected 1/0/yes/no/true/false, got '{}'", other)),
    }
}
