//! CLI command implementations for smaps-analyzer.
//!
//! This module provides implementations for all CLI subcommands:
//! - `flatten`: Thread folding, written back as raw captures
//! - `normalize`: Conversion to normalized CSV
//! - `analyze`: HTML report directory
//! - `appvals`: Per-application summary CSV
//! - `diff`: Ranked multi-snapshot comparison
//! - `config`: Configuration file generation

pub mod analyze;
pub mod appvals;
pub mod config;
pub mod diff;
pub mod flatten;
pub mod normalize;

use std::path::{Path, PathBuf};

use smaps_analyzer::CowPolicy;

use crate::cli::CowPolicyArg;

// Re-export command functions
pub use analyze::command_analyze;
pub use appvals::command_appvals;
pub use config::command_config;
pub use diff::command_diff;
pub use flatten::command_flatten;
pub use normalize::command_normalize;

/// Output path for the `index`-th source: the explicit output for the first
/// source, otherwise the source path with `extension`.
pub(crate) fn output_for(index: usize, source: &Path, output: Option<&Path>, extension: &str) -> PathBuf {
    match (index, output) {
        (0, Some(out)) => out.to_path_buf(),
        _ => source.with_extension(extension),
    }
}

pub(crate) fn cow_policy(arg: Option<CowPolicyArg>, configured: Option<CowPolicy>) -> CowPolicy {
    match arg {
        Some(CowPolicyArg::Recorded) => CowPolicy::Recorded,
        Some(CowPolicyArg::SharedWritable) => CowPolicy::SharedWritable,
        None => configured.unwrap_or_default(),
    }
}
