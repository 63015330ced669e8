//! smaps-analyzer - offline smaps snapshot analysis.
//!
//! Entry point: parses arguments, resolves configuration, installs logging,
//! sizes the rayon pool and dispatches to the subcommand.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use smaps_analyzer::{Diagnostics, Verbosity, DEFAULT_SIZE_WARNING_LIMIT};

use cli::{Args, Commands, LogLevel};
use commands::diff::DiffArgs;
use commands::{
    command_analyze, command_appvals, command_config, command_diff, command_flatten, command_normalize, cow_policy,
};
use config::{resolve_config, show_config, validate_effective_config, Config, DEFAULT_PAGE_ROWS};

/// Initializes tracing logging subsystem with configured log level.
///
/// Debug verbosity raises the level to at least DEBUG so the messages it
/// enables are not filtered out again by the subscriber.
fn setup_logging(config: &Config, args: &Args) {
    let log_level = match config.log_level(args) {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };
    let log_level = if config.verbosity() == Verbosity::Debug {
        log_level.max(LevelFilter::DEBUG)
    } else {
        log_level
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    debug!("Logging initialized with level: {}", log_level);
}

/// Configure parallel processing
fn setup_thread_pool(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
            debug!("Rayon thread pool configured with {} threads", threads);
        }
    }
}

/// Runs the selected command. Errors raised before the diagnostics context
/// exists are returned; command failures are reported through it.
fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    if args.show_config {
        show_config(&config, args.config_format)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Err(e) = validate_effective_config(&config) {
        anyhow::bail!("Configuration invalid: {}", e);
    }

    setup_logging(&config, &args);
    setup_thread_pool(&config);

    let diag = Diagnostics::with_size_warning_limit(
        config.verbosity(),
        config.size_warning_limit.unwrap_or(DEFAULT_SIZE_WARNING_LIMIT),
    );

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let result = match command {
        Commands::Flatten { io } => command_flatten(&io, &diag),
        Commands::Normalize { io } => command_normalize(&io, &diag),
        Commands::Analyze {
            io,
            page_rows,
            cow_policy: policy,
        } => {
            let page_rows = page_rows.or(config.page_rows).unwrap_or(DEFAULT_PAGE_ROWS).max(1);
            command_analyze(&io, page_rows, cow_policy(policy, config.cow_policy), &diag)
        }
        Commands::Appvals {
            io,
            cow_policy: policy,
        } => command_appvals(&io, cow_policy(policy, config.cow_policy), &diag),
        Commands::Diff {
            sources,
            output,
            level,
            min_rank,
            mode,
            filtered_output,
            exclude,
            cow_policy: policy,
        } => {
            let diff_args = DiffArgs {
                sources,
                output,
                level,
                min_rank,
                mode,
                filtered_output,
                exclude,
            };
            command_diff(&diff_args, &config, cow_policy(policy, config.cow_policy), &diag)
        }
        Commands::Config {
            output,
            format,
            commented,
        } => command_config(output, format, commented),
    };

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diag.fatal(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    };
    info!(
        "{} warnings, {} errors, {} size mismatches",
        diag.warning_count(),
        diag.error_count(),
        diag.size_mismatch_count()
    );
    Ok(code)
}

/// Main application entry point.
fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
