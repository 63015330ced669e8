//! Record model: captures, mappings, and the field catalogs that describe them.
//!
//! - `schema`: declarative field descriptors shared by parsers and writers
//! - `capture`: per-process snapshot records and the process tree arena
//! - `mapping`: per-VMA records and their classification
//! - `category`: the ordered category catalog used by statistic tables

pub mod capture;
pub mod category;
pub mod mapping;
pub mod schema;

pub use capture::{normalize_name, Capture, VmCounters, CAPTURE_FIELDS, NO_NAME};
pub use category::{CategoryCatalog, BUILTIN_CATEGORIES, TOTAL};
pub use mapping::{category_of, Mapping, ANON, MAPPING_FIELDS};
pub use schema::{FieldError, FieldSpec};
