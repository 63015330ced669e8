//! Capture records: one process (or, before flattening, one thread) snapshot.

use crate::model::schema::{number_field, FieldSpec};

/// Sentinel for a process whose name is not known.
pub const NO_NAME: &str = "unknown";

/// Whole-process virtual memory counters from the capture metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VmCounters {
    pub size: u64,
    pub locked: u64,
    pub resident: u64,
    pub data: u64,
    pub stack: u64,
    pub code: u64,
    pub library: u64,
    pub page_tables: u64,
}

/// One capture record plus its position in the process tree.
///
/// Tree links are indices into the arena (`Vec<Capture>`) the record lives
/// in. Merged-away records stay in place with `alive == false`.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Text between `==>` and `<==` on the record's tag line.
    pub tag: String,
    pub name: String,
    pub pid: u32,
    pub ppid: u32,
    pub threads: u32,
    pub vm: VmCounters,
    /// Raw mapping body lines, classified later.
    pub body: Vec<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub alive: bool,
    /// True when `pid` came from capture metadata rather than a fallback.
    pub has_pid: bool,
}

impl Capture {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: NO_NAME.to_string(),
            pid: 0,
            ppid: 0,
            threads: 1,
            vm: VmCounters::default(),
            body: Vec::new(),
            parent: None,
            children: Vec::new(),
            alive: true,
            has_pid: false,
        }
    }

    /// Identity used to detect per-thread duplicates of one process.
    pub fn merge_key(&self) -> (&str, VmCounters) {
        (self.name.as_str(), self.vm)
    }
}

/// Strips the leading dashes some kernels prefix to command names.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.trim().trim_start_matches('-');
    if name.is_empty() {
        NO_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Capture metadata catalog, in emission order.
pub static CAPTURE_FIELDS: &[FieldSpec<Capture>] = &[
    FieldSpec {
        name: "name",
        label: Some("Name"),
        encode: |c| c.name.clone(),
        decode: |c, v| {
            c.name = normalize_name(v);
            Ok(())
        },
    },
    FieldSpec {
        name: "pid",
        label: Some("Pid"),
        encode: |c| c.pid.to_string(),
        decode: |c, v| {
            c.pid = crate::model::schema::decode_number("pid", v)?;
            c.has_pid = c.pid != 0;
            Ok(())
        },
    },
    number_field!(Capture, "ppid", Some("PPid"), ppid),
    number_field!(Capture, "threads", Some("Threads"), threads),
    number_field!(Capture, "vmsize", Some("VmSize"), vm.size),
    number_field!(Capture, "vmlck", Some("VmLck"), vm.locked),
    number_field!(Capture, "vmrss", Some("VmRSS"), vm.resident),
    number_field!(Capture, "vmdata", Some("VmData"), vm.data),
    number_field!(Capture, "vmstk", Some("VmStk"), vm.stack),
    number_field!(Capture, "vmexe", Some("VmExe"), vm.code),
    number_field!(Capture, "vmlib", Some("VmLib"), vm.library),
    number_field!(Capture, "vmpte", Some("VmPTE"), vm.page_tables),
];
