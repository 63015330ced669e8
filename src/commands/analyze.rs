//! Analyze command implementation.
//!
//! Aggregates each source and writes its HTML report: a navigation page
//! plus one page per application and per object under `<stem>.dir/`.

use anyhow::Context;
use std::time::Instant;
use tracing::info;

use smaps_analyzer::report::save_html_report;
use smaps_analyzer::{import, Aggregation, CowPolicy, Diagnostics};

use crate::cli::SourceArgs;
use crate::commands::output_for;

pub fn command_analyze(io: &SourceArgs, page_rows: usize, policy: CowPolicy, diag: &Diagnostics) -> anyhow::Result<()> {
    for (i, source) in io.sources.iter().enumerate() {
        let start = Instant::now();
        let maps = import(source, diag).with_context(|| format!("importing {}", source.display()))?;
        let agg = Aggregation::new(maps, policy);

        let out = output_for(i, source, io.output.as_deref(), "html");
        let paths = save_html_report(&agg, &out, page_rows, diag)
            .with_context(|| format!("writing report {}", out.display()))?;
        info!(
            "{}: {} applications, {} objects -> {} ({:.2?})",
            source.display(),
            agg.apps.len(),
            agg.objects.len(),
            paths.navigation.display(),
            start.elapsed()
        );
    }
    Ok(())
}
