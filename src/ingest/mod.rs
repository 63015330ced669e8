//! Ingestion pipeline: raw captures and normalized CSV into mappings.
//!
//! raw capture ─▶ flatten ─▶ classifier ─┐
//!                                       ├─▶ Vec<Mapping>
//! normalized CSV ───────────────────────┘

pub mod classifier;
pub mod csv;
pub mod flatten;
pub mod import;
pub mod raw;

pub use classifier::maps_from_captures;
pub use csv::{generator, load_csv, parse_csv, save_csv, to_csv, write_csv};
pub use flatten::{flatten, FALLBACK_PID_BASE};
pub use import::{import, import_all, import_captures, Snapshot, SourceFormat};
pub use raw::{load_capture, parse_capture, save_capture, write_capture};
