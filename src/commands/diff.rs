//! Diff command implementation.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use smaps_analyzer::report::save_diff;
use smaps_analyzer::{diff, import_all, CowPolicy, DiffLevel, DiffMode, DiffOptions, Diagnostics};

use crate::config::{Config, DEFAULT_DIFF_LEVEL, DEFAULT_DIFF_MIN_RANK};

/// Diff options as given on the command line.
#[derive(Debug, Default)]
pub struct DiffArgs {
    pub sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub level: Option<i64>,
    pub min_rank: Option<f64>,
    pub mode: Option<String>,
    pub filtered_output: Option<bool>,
    pub exclude: Option<String>,
}

/// Level: `-l`, then the output file name, then the config.
pub(crate) fn resolve_level(args: &DiffArgs, config: &Config) -> DiffLevel {
    if let Some(level) = args.level {
        return DiffLevel::from_index(level);
    }
    if let Some(level) = args.output.as_deref().and_then(DiffLevel::from_file_name) {
        return level;
    }
    DiffLevel::from_index(config.diff_level.unwrap_or(DEFAULT_DIFF_LEVEL))
}

pub(crate) fn resolve_options(args: &DiffArgs, config: &Config, policy: CowPolicy) -> DiffOptions {
    let exclude_commands = match &args.exclude {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => config.diff_exclude_commands.clone().unwrap_or_default(),
    };
    DiffOptions {
        level: resolve_level(args, config),
        min_rank: args
            .min_rank
            .or(config.diff_min_rank)
            .unwrap_or(DEFAULT_DIFF_MIN_RANK),
        exclude_commands,
        cow_policy: policy,
    }
}

pub fn command_diff(args: &DiffArgs, config: &Config, policy: CowPolicy, diag: &Diagnostics) -> anyhow::Result<()> {
    let output: Option<&Path> = args.output.as_deref();
    let mode = DiffMode::resolve(args.mode.as_deref(), output)?;
    let filtered = args
        .filtered_output
        .or(config.diff_filtered_output)
        .unwrap_or_else(|| mode.filtered_by_default());
    let opts = resolve_options(args, config, policy);
    debug!("diff options: {:?}, mode {:?}, filtered {}", opts, mode, filtered);

    let snapshots = import_all(&args.sources, diag).context("importing snapshots")?;
    let report = diff(&snapshots, &opts);
    info!(
        "{} snapshots, level {}, {} rows at rank >= {}",
        snapshots.len(),
        opts.level.label(),
        report.rows.len(),
        opts.min_rank
    );

    save_diff(output, &report, mode, filtered, diag)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_precedence() {
        let config = Config::default();
        let mut args = DiffArgs {
            output: Some(PathBuf::from("boot.pid.csv")),
            ..DiffArgs::default()
        };
        assert_eq!(resolve_level(&args, &config), DiffLevel::Pid);

        args.level = Some(9);
        assert_eq!(resolve_level(&args, &config), DiffLevel::Path);

        args.level = None;
        args.output = Some(PathBuf::from("boot.csv"));
        assert_eq!(resolve_level(&args, &config), DiffLevel::Type);

        let config = Config {
            diff_level: Some(1),
            ..Config::default()
        };
        assert_eq!(resolve_level(&args, &config), DiffLevel::Command);
    }

    #[test]
    fn test_exclude_list() {
        let config = Config {
            diff_exclude_commands: Some(vec!["sh".into()]),
            ..Config::default()
        };
        let args = DiffArgs::default();
        assert_eq!(resolve_options(&args, &config, CowPolicy::Recorded).exclude_commands, vec!["sh"]);

        let args = DiffArgs {
            exclude: Some("bash, sleep,".into()),
            min_rank: Some(0.0),
            ..DiffArgs::default()
        };
        let opts = resolve_options(&args, &config, CowPolicy::Recorded);
        assert_eq!(opts.exclude_commands, vec!["bash", "sleep"]);
        assert_eq!(opts.min_rank, 0.0);
    }
}
