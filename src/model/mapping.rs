//! Mapping records: one virtual memory area of a captured process.

use std::path::Path;

use crate::model::capture::{normalize_name, Capture};
use crate::model::category::TOTAL;
use crate::model::schema::{number_field, text_field, FieldSpec};

/// Path sentinel for mappings without a backing object.
pub const ANON: &str = "[anon]";

/// One VMA with its raw size metrics and the values derived from them.
///
/// All sizes are in kB, as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    // -- owner --
    pub name: String,
    pub pid: u32,
    pub ppid: u32,
    pub threads: u32,

    // -- address line --
    pub head: u64,
    pub tail: u64,
    pub prot: String,
    pub offset: u64,
    pub node: String,
    pub flags: u64,
    pub path: String,

    // -- raw sizes --
    pub size: u64,
    pub resident: u64,
    pub shared_clean: u64,
    pub shared_dirty: u64,
    pub private_clean: u64,
    pub private_dirty: u64,

    // -- derived --
    pub private: u64,
    pub shared: u64,
    pub clean: u64,
    pub cow: u64,
    pub category: String,
    pub file: String,
}

impl Default for Mapping {
    fn default() -> Self {
        Self {
            name: crate::model::capture::NO_NAME.to_string(),
            pid: 0,
            ppid: 0,
            threads: 1,
            head: 0,
            tail: 0,
            prot: String::new(),
            offset: 0,
            node: "00:00".to_string(),
            flags: 0,
            path: ANON.to_string(),
            size: 0,
            resident: 0,
            shared_clean: 0,
            shared_dirty: 0,
            private_clean: 0,
            private_dirty: 0,
            private: 0,
            shared: 0,
            clean: 0,
            cow: 0,
            category: String::new(),
            file: String::new(),
        }
    }
}

impl Mapping {
    /// Starts a mapping owned by `cap`.
    pub fn for_capture(cap: &Capture) -> Self {
        Self {
            name: cap.name.clone(),
            pid: cap.pid,
            ppid: cap.ppid,
            threads: cap.threads,
            ..Self::default()
        }
    }

    pub fn is_executable(&self) -> bool {
        self.prot.contains('x')
    }

    /// Writable and not shared: pages that would be duplicated on write.
    pub fn is_private_writable(&self) -> bool {
        self.prot.contains('w') && !self.prot.contains('s')
    }

    /// Fills in the classification-time fields.
    ///
    /// Runs exactly once per mapping, after the raw fields are complete.
    /// `cow` is reset here and only populated by aggregation.
    pub fn derive(&mut self) {
        self.file = Path::new(&self.path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone());
        self.category = category_of(&self.path, &self.prot);

        self.clean = self.shared_clean + self.private_clean;
        self.shared = self.shared_dirty;
        self.private = self.private_dirty;
        self.cow = 0;

        self.name = normalize_name(&self.name);
    }
}

/// Category of a mapping: bracketed pseudo paths name themselves,
/// everything else is code or data depending on execute permission.
/// `[total]` keeps its brackets; `total` is reserved for the summary row.
pub fn category_of(path: &str, prot: &str) -> String {
    if let Some(inner) = path.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        if inner == TOTAL {
            return path.to_string();
        }
        return inner.to_string();
    }
    if prot.contains('x') {
        "code".to_string()
    } else {
        "data".to_string()
    }
}

/// Normalized CSV column catalog, in column order. Only the raw size
/// metrics carry a label: those are the `Key: Value kB` lines of a mapping body.
pub static MAPPING_FIELDS: &[FieldSpec<Mapping>] = &[
    text_field!(Mapping, "name", None, name),
    number_field!(Mapping, "pid", None, pid),
    number_field!(Mapping, "ppid", None, ppid),
    number_field!(Mapping, "threads", None, threads),
    number_field!(Mapping, "head", None, head),
    number_field!(Mapping, "tail", None, tail),
    text_field!(Mapping, "prot", None, prot),
    number_field!(Mapping, "offs", None, offset),
    text_field!(Mapping, "node", None, node),
    number_field!(Mapping, "flag", None, flags),
    text_field!(Mapping, "path", None, path),
    number_field!(Mapping, "size", Some("Size"), size),
    number_field!(Mapping, "rss", Some("Rss"), resident),
    number_field!(Mapping, "shacln", Some("Shared_Clean"), shared_clean),
    number_field!(Mapping, "shadty", Some("Shared_Dirty"), shared_dirty),
    number_field!(Mapping, "pricln", Some("Private_Clean"), private_clean),
    number_field!(Mapping, "pridty", Some("Private_Dirty"), private_dirty),
    number_field!(Mapping, "pri", None, private),
    number_field!(Mapping, "sha", None, shared),
    number_field!(Mapping, "cln", None, clean),
    number_field!(Mapping, "cow", None, cow),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_of() {
        assert_eq!(category_of("[heap]", "rw-p"), "heap");
        assert_eq!(category_of("[stack]", "rw-p"), "stack");
        assert_eq!(category_of(ANON, "rw-p"), "anon");
        assert_eq!(category_of("/lib/libc.so.6", "r-xp"), "code");
        assert_eq!(category_of("/lib/libc.so.6", "rw-p"), "data");
        // brackets must enclose the whole path
        assert_eq!(category_of("/tmp/[x]", "r--p"), "data");
        assert_eq!(category_of("[total]", "rw-p"), "[total]");
    }

    #[test]
    fn test_derive_metrics() {
        let mut m = Mapping {
            name: "-sh".into(),
            path: "/bin/busybox".into(),
            prot: "r-xp".into(),
            shared_clean: 12,
            private_clean: 4,
            shared_dirty: 3,
            private_dirty: 7,
            cow: 99,
            ..Mapping::default()
        };
        m.derive();

        assert_eq!(m.file, "busybox");
        assert_eq!(m.category, "code");
        assert_eq!(m.clean, 16);
        assert_eq!(m.shared, 3);
        assert_eq!(m.private, 7);
        assert_eq!(m.cow, 0);
        assert_eq!(m.name, "sh");
    }

    #[test]
    fn test_private_writable() {
        let mut m = Mapping::default();
        m.prot = "rw-p".into();
        assert!(m.is_private_writable());
        m.prot = "rw-s".into();
        assert!(!m.is_private_writable());
        m.prot = "r--p".into();
        assert!(!m.is_private_writable());
    }

    #[test]
    fn test_catalog_labels_are_unique() {
        let mut names: Vec<_> = MAPPING_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MAPPING_FIELDS.len());
    }
}
