//! Diagnostics context shared by every pipeline stage.
//!
//! The verbosity level only decides whether a message is emitted; it never
//! changes which code path is taken. Messages are forwarded to `tracing`, so
//! the sink is whatever subscriber the binary installed.
//!
//! Counters are atomics so one context can be shared by parallel imports.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Default number of size mismatch warnings emitted per run.
pub const DEFAULT_SIZE_WARNING_LIMIT: usize = 8;

/// Diagnostic verbosity ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Silent = 0,
    Fatal = 1,
    Error = 2,
    Warning = 3,
    Debug = 4,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Warning
    }
}

impl Verbosity {
    /// Converts a numeric level, saturating at both ends.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=0 => Verbosity::Silent,
            1 => Verbosity::Fatal,
            2 => Verbosity::Error,
            3 => Verbosity::Warning,
            _ => Verbosity::Debug,
        }
    }

    pub fn level(self) -> i32 {
        self as i32
    }
}

/// Explicit replacement for a process-wide message level.
#[derive(Debug)]
pub struct Diagnostics {
    verbosity: Verbosity,
    size_warning_limit: usize,
    size_warnings: AtomicUsize,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

impl Diagnostics {
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_size_warning_limit(verbosity, DEFAULT_SIZE_WARNING_LIMIT)
    }

    pub fn with_size_warning_limit(verbosity: Verbosity, limit: usize) -> Self {
        Self {
            verbosity,
            size_warning_limit: limit,
            size_warnings: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    /// Reports a condition that terminates the run. Counted as an error.
    pub fn fatal(&self, msg: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if self.enabled(Verbosity::Fatal) {
            error!("FATAL: {}", msg);
        }
    }

    pub fn error(&self, msg: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if self.enabled(Verbosity::Error) {
            error!("{}", msg);
        }
    }

    pub fn warning(&self, msg: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        if self.enabled(Verbosity::Warning) {
            warn!("{}", msg);
        }
    }

    pub fn debug(&self, msg: &str) {
        if self.enabled(Verbosity::Debug) {
            debug!("{}", msg);
        }
    }

    /// Rate-limited warning for mapping size inconsistencies.
    ///
    /// The message closure is only evaluated while below the limit. Hitting
    /// the limit emits a single suppression notice.
    pub fn size_mismatch<F>(&self, msg: F)
    where
        F: FnOnce() -> String,
    {
        let seen = self.size_warnings.fetch_add(1, Ordering::Relaxed);
        if seen < self.size_warning_limit {
            self.warning(&msg());
        }
        if seen + 1 == self.size_warning_limit {
            self.warning("suppressing further SIZE MISMATCH warnings");
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn size_mismatch_count(&self) -> usize {
        self.size_warnings.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_level_saturates() {
        assert_eq!(Verbosity::from_level(-3), Verbosity::Silent);
        assert_eq!(Verbosity::from_level(0), Verbosity::Silent);
        assert_eq!(Verbosity::from_level(2), Verbosity::Error);
        assert_eq!(Verbosity::from_level(3), Verbosity::Warning);
        assert_eq!(Verbosity::from_level(9), Verbosity::Debug);
    }

    #[test]
    fn test_counters_ignore_verbosity() {
        let diag = Diagnostics::new(Verbosity::Silent);
        diag.warning("ignored line");
        diag.error("duplicate PID 7");
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn test_fatal_counts_as_error() {
        let diag = Diagnostics::new(Verbosity::Silent);
        diag.fatal("boot.csv: No such file or directory");
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_size_mismatch_rate_limit() {
        let diag = Diagnostics::with_size_warning_limit(Verbosity::Silent, 3);
        let mut rendered = 0;
        for _ in 0..10 {
            diag.size_mismatch(|| {
                rendered += 1;
                "SIZE MISMATCH".to_string()
            });
        }
        assert_eq!(rendered, 3);
        assert_eq!(diag.size_mismatch_count(), 10);
        // three mismatches plus the suppression notice
        assert_eq!(diag.warning_count(), 4);
    }
}
