//! Normalize command implementation.

use anyhow::Context;
use rayon::prelude::*;
use tracing::info;

use smaps_analyzer::ingest::save_csv;
use smaps_analyzer::{import, Diagnostics};

use crate::cli::SourceArgs;
use crate::commands::output_for;

/// Imports every source (raw or CSV) and writes normalized CSV.
pub fn command_normalize(io: &SourceArgs, diag: &Diagnostics) -> anyhow::Result<()> {
    io.sources.par_iter().enumerate().try_for_each(|(i, source)| {
        let maps = import(source, diag).with_context(|| format!("importing {}", source.display()))?;
        let out = output_for(i, source, io.output.as_deref(), "csv");
        save_csv(&out, &maps, diag)?;
        info!("{}: {} mappings -> {}", source.display(), maps.len(), out.display());
        Ok::<(), anyhow::Error>(())
    })
}
