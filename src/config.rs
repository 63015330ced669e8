//! Configuration management for smaps-analyzer.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use serde::{Deserialize, Serialize};
use smaps_analyzer::{CowPolicy, Verbosity, DEFAULT_SIZE_WARNING_LIMIT};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_DIFF_LEVEL: i64 = 3;
pub const DEFAULT_DIFF_MIN_RANK: f64 = 4.0;
pub const DEFAULT_PAGE_ROWS: usize = 20;

/// Config files tried in order when `--config` is absent.
pub const DEFAULT_CONFIG_PATHS: [&str; 4] = [
    "./smaps-analyzer.yaml",
    "./smaps-analyzer.yml",
    "./smaps-analyzer.json",
    "./smaps-analyzer.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    // Logging
    pub log_level: Option<String>,
    /// Diagnostic verbosity 0 (silent) .. 4 (debug)
    pub verbosity: Option<i32>,
    #[serde(alias = "size-warning-limit")]
    pub size_warning_limit: Option<usize>,

    // Performance tuning
    pub parallelism: Option<usize>,

    // Diff
    #[serde(alias = "diff-level")]
    pub diff_level: Option<i64>,
    #[serde(alias = "diff-min-rank")]
    pub diff_min_rank: Option<f64>,
    /// Unset: filtered for HTML, plain for CSV
    #[serde(alias = "diff-filtered-output")]
    pub diff_filtered_output: Option<bool>,
    #[serde(alias = "diff-exclude-commands")]
    pub diff_exclude_commands: Option<Vec<String>>,

    // Report
    #[serde(alias = "page-rows")]
    pub page_rows: Option<usize>,
    #[serde(alias = "cow-policy")]
    pub cow_policy: Option<CowPolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("warn".into()),
            verbosity: Some(Verbosity::default().level()),
            size_warning_limit: Some(DEFAULT_SIZE_WARNING_LIMIT),
            parallelism: Some(0),
            diff_level: Some(DEFAULT_DIFF_LEVEL),
            diff_min_rank: Some(DEFAULT_DIFF_MIN_RANK),
            diff_filtered_output: None,
            diff_exclude_commands: Some(Vec::new()),
            page_rows: Some(DEFAULT_PAGE_ROWS),
            cow_policy: Some(CowPolicy::default()),
        }
    }
}

impl Config {
    /// Effective log level: CLI, then config, then warn.
    pub fn log_level(&self, args: &Args) -> LogLevel {
        if let Some(level) = args.log_level {
            return level;
        }
        match self.log_level.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("off") => LogLevel::Off,
            Some("error") => LogLevel::Error,
            Some("info") => LogLevel::Info,
            Some("debug") => LogLevel::Debug,
            Some("trace") => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.verbosity.unwrap_or_else(|| Verbosity::default().level()))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), String> {
    if let Some(level) = cfg.log_level.as_deref() {
        match level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => return Err(format!("Invalid log_level '{}'", other)),
        }
    }

    if let Some(level) = cfg.diff_level {
        if !(0..=4).contains(&level) {
            return Err(format!("diff_level {} out of range, expected 0..=4", level));
        }
    }

    if let Some(rank) = cfg.diff_min_rank {
        if rank.is_nan() || rank < 0.0 {
            return Err(format!("diff_min_rank must be >= 0, got {}", rank));
        }
    }

    if cfg.page_rows == Some(0) {
        return Err("page_rows must be greater than 0".into());
    }

    if let Some(v) = cfg.verbosity {
        if !(0..=4).contains(&v) {
            return Err(format!("verbosity {} out of range, expected 0..=4", v));
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_ascii_lowercase());
    }

    // Verbosity: -s wins, then -v/-q relative to the configured level
    if args.silent {
        config.verbosity = Some(Verbosity::Silent.level());
    } else if args.verbose > 0 || args.quiet > 0 {
        let base = config.verbosity().level();
        let level = base + i32::from(args.verbose) - i32::from(args.quiet);
        config.verbosity = Some(Verbosity::from_level(level).level());
    }

    if let Some(n) = args.parallelism {
        config.parallelism = Some(n);
    }

    Ok(config)
}

/// Loads the given config file, or the first default location that exists.
/// Missing files yield the defaults; an explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&path, &content)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(merge_defaults(config))
}

fn parse_config(path: &Path, content: &str) -> anyhow::Result<Config> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Fills unset keys of a loaded file from the defaults.
fn merge_defaults(cfg: Config) -> Config {
    let d = Config::default();
    Config {
        log_level: cfg.log_level.or(d.log_level),
        verbosity: cfg.verbosity.or(d.verbosity),
        size_warning_limit: cfg.size_warning_limit.or(d.size_warning_limit),
        parallelism: cfg.parallelism.or(d.parallelism),
        diff_level: cfg.diff_level.or(d.diff_level),
        diff_min_rank: cfg.diff_min_rank.or(d.diff_min_rank),
        diff_filtered_output: cfg.diff_filtered_output.or(d.diff_filtered_output),
        diff_exclude_commands: cfg.diff_exclude_commands.or(d.diff_exclude_commands),
        page_rows: cfg.page_rows.or(d.page_rows),
        cow_policy: cfg.cow_policy.or(d.cow_policy),
    }
}

/// Renders a config in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> anyhow::Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.diff_level, Some(3));
        assert_eq!(cfg.diff_min_rank, Some(4.0));
        assert_eq!(cfg.page_rows, Some(20));
        assert_eq!(cfg.verbosity(), Verbosity::Warning);
    }

    #[test]
    fn test_validation_errors() {
        let cfg = Config {
            diff_level: Some(7),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            diff_min_rank: Some(-1.0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            page_rows: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            log_level: Some("chatty".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_load_yaml_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "diff_level: 2\ncow_policy: shared-writable\ndiff_exclude_commands: [sh]").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.diff_level, Some(2));
        assert_eq!(cfg.cow_policy, Some(CowPolicy::SharedWritable));
        assert_eq!(cfg.diff_exclude_commands, Some(vec!["sh".to_string()]));
        assert_eq!(cfg.diff_min_rank, Some(4.0));
    }

    #[test]
    fn test_load_json_and_toml() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"page_rows": 5}}"#).unwrap();
        assert_eq!(load_config(Some(json.path())).unwrap().page_rows, Some(5));

        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "diff_min_rank = 1.5").unwrap();
        assert_eq!(load_config(Some(toml_file.path())).unwrap().diff_min_rank, Some(1.5));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/smaps-analyzer.yaml"))).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from(["smaps-analyzer", "--no-config", "-vv", "--parallelism", "2", "normalize", "a.cap"]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.verbosity(), Verbosity::Debug);
        assert_eq!(cfg.parallelism, Some(2));

        let args = Args::parse_from(["smaps-analyzer", "--no-config", "-q", "-s", "normalize", "a.cap"]);
        assert_eq!(resolve_config(&args).unwrap().verbosity(), Verbosity::Silent);

        let args = Args::parse_from(["smaps-analyzer", "--no-config", "--log-level", "debug", "normalize", "a.cap"]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.log_level(&args), LogLevel::Debug);
    }

    #[test]
    fn test_render_round_trip_yaml() {
        let cfg = Config::default();
        let text = render_config(&cfg, ConfigFormat::Yaml).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
