//! Source format dispatch and multi-file import.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::diagnostics::Diagnostics;
use crate::error::SmapsResult;
use crate::ingest::classifier::maps_from_captures;
use crate::ingest::csv::load_csv;
use crate::ingest::flatten::flatten;
use crate::ingest::raw::load_capture;
use crate::model::{Capture, Mapping};

/// Input format, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// `.cap` / `.flat`: raw capture records.
    Capture,
    /// `.csv`: normalized mappings.
    Csv,
    /// Anything else, read as CSV after a warning.
    Unknown,
}

impl SourceFormat {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("cap") | Some("flat") => SourceFormat::Capture,
            Some("csv") => SourceFormat::Csv,
            _ => SourceFormat::Unknown,
        }
    }
}

/// Mappings imported from one source file.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub source: PathBuf,
    pub maps: Vec<Mapping>,
}

/// Loads and flattens a raw capture file. Any extension is accepted.
pub fn import_captures(path: &Path, diag: &Diagnostics) -> SmapsResult<Vec<Capture>> {
    if SourceFormat::of(path) != SourceFormat::Capture {
        diag.warning(&format!("{}: assuming RAW capture format data", path.display()));
    }
    let caps = load_capture(path, diag)?;
    Ok(flatten(caps, diag))
}

/// Imports one source into classified mappings.
pub fn import(path: &Path, diag: &Diagnostics) -> SmapsResult<Vec<Mapping>> {
    match SourceFormat::of(path) {
        SourceFormat::Capture => {
            let mut caps = import_captures(path, diag)?;
            Ok(maps_from_captures(&mut caps, diag))
        }
        SourceFormat::Csv => load_csv(path, diag),
        SourceFormat::Unknown => {
            diag.warning(&format!("{}: assuming CSV capture format data", path.display()));
            load_csv(path, diag)
        }
    }
}

/// Imports every source, in parallel on the current rayon pool. Results
/// keep input order; the first fatal error wins.
pub fn import_all<P>(paths: &[P], diag: &Diagnostics) -> SmapsResult<Vec<Snapshot>>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|p| {
            let path = p.as_ref();
            import(path, diag).map(|maps| Snapshot {
                source: path.to_path_buf(),
                maps,
            })
        })
        .collect()
}
