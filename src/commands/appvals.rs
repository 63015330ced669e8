//! Appvals command implementation.

use anyhow::Context;
use tracing::info;

use smaps_analyzer::report::save_appvals;
use smaps_analyzer::{import, Aggregation, CowPolicy, Diagnostics};

use crate::cli::SourceArgs;
use crate::commands::output_for;

/// Writes one per-application summary CSV per source.
pub fn command_appvals(io: &SourceArgs, policy: CowPolicy, diag: &Diagnostics) -> anyhow::Result<()> {
    for (i, source) in io.sources.iter().enumerate() {
        let maps = import(source, diag).with_context(|| format!("importing {}", source.display()))?;
        let agg = Aggregation::new(maps, policy);
        let out = output_for(i, source, io.output.as_deref(), "apps");
        save_appvals(&out, &agg, diag)?;
        info!("{}: {} applications -> {}", source.display(), agg.apps.len(), out.display());
    }
    Ok(())
}
