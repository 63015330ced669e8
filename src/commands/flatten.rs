//! Flatten command implementation.
//!
//! Folds thread records into their processes and writes the result back in
//! raw capture format.

use anyhow::Context;
use rayon::prelude::*;
use tracing::info;

use smaps_analyzer::ingest::save_capture;
use smaps_analyzer::{import_captures, Diagnostics};

use crate::cli::SourceArgs;
use crate::commands::output_for;

pub fn command_flatten(io: &SourceArgs, diag: &Diagnostics) -> anyhow::Result<()> {
    io.sources.par_iter().enumerate().try_for_each(|(i, source)| {
        let caps = import_captures(source, diag).with_context(|| format!("flattening {}", source.display()))?;
        let out = output_for(i, source, io.output.as_deref(), "flat");
        save_capture(&out, &caps, diag)?;
        info!("{}: {} captures -> {}", source.display(), caps.len(), out.display());
        Ok::<(), anyhow::Error>(())
    })
}
