//! smaps-analyzer library
//!
//! Offline analysis of per-process memory map snapshots. The pipeline is a
//! synchronous batch run:
//!
//! - **Ingest**: raw `==>tag<==` capture records or normalized CSV
//! - **Flatten**: fold thread records into their owning process
//! - **Classify**: parse mapping bodies into typed [`Mapping`] records
//! - **Aggregate**: per-application, per-object and system [`StatTable`]s
//! - **Diff**: rank per-metric differences across several snapshots
//! - **Render**: HTML report pages, application value CSV, diff reports
//!
//! # Usage
//!
//! ```rust,no_run
//! use smaps_analyzer::{diff, import_all, DiffOptions, Diagnostics, Verbosity};
//!
//! let diag = Diagnostics::new(Verbosity::Warning);
//! let snapshots = import_all(&["boot.csv", "idle.csv"], &diag)?;
//! let report = diff(&snapshots, &DiffOptions::default());
//! for row in &report.rows {
//!     println!("{:?} {:?} {:.2}", row.keys, row.values, row.rank);
//! }
//! # Ok::<(), smaps_analyzer::SmapsError>(())
//! ```

pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod ingest;
pub mod model;
pub mod report;
pub mod stats;
pub mod table;

// Re-export main types for convenience
pub use diagnostics::{Diagnostics, Verbosity, DEFAULT_SIZE_WARNING_LIMIT};
pub use diff::{diff, DiffLevel, DiffMode, DiffOptions, DiffReport, DiffRow, Metric};
pub use error::{SmapsError, SmapsResult};
pub use ingest::{import, import_all, import_captures, Snapshot, SourceFormat};
pub use model::{Capture, CategoryCatalog, Mapping};
pub use stats::{Aggregation, CowPolicy, MemRow, StatTable};
