//! Config command implementation.
//!
//! Generates configuration files in various formats.

use anyhow::Context;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> anyhow::Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("smaps-analyzer.yaml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content).with_context(|| format!("writing {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# smaps-analyzer Configuration
# ============================
#
# Logging / Diagnostics
# ---------------------
# log_level: "warn"            # off, error, warn, info, debug, trace
# verbosity: 3                 # 0 silent, 1 fatal, 2 error, 3 warning, 4 debug
# size_warning_limit: 8        # SIZE MISMATCH warnings shown per run
#
# Performance Tuning
# ------------------
# parallelism: 0               # Parallel threads (0 = auto)
#
# Diff
# ----
# diff_level: 3                # 0 sys, 1 cmd, 2 pid, 3 type, 4 path
# diff_min_rank: 4.0           # Rows ranked below this are dropped
# diff_filtered_output: null   # null = filtered for html, plain for csv
# diff_exclude_commands: []    # Commands left out of the diff
#
# Report
# ------
# page_rows: 20                # Target rows per page in long tables
# cow_policy: recorded         # recorded | shared-writable
"#;

    format!("{comments}\n{yaml}")
}
