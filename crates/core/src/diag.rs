use std::collections::HashSet;
use std::ops::{Add, AddAssign};

use serde::Serialize;

/// Stable warning IDs, usable in a job's suppression set.
pub mod warning {
    /// Line ending could not be determined, LF assumed.
    pub const AMBIGUOUS_LINE_ENDING: u32 = 1;
    /// A tag was found inside an active rm/rmn scope and ignored.
    pub const TAG_IN_REMOVE_SCOPE: u32 = 2;
    /// Stray text after a directive keyword.
    pub const NO_NEWLINE_AFTER_EXPRESSION: u32 = 3;
    /// rmn asked for more lines than the file had left.
    pub const RMN_OVERLAPPED_EOF: u32 = 4;
    /// The same file was included more than once.
    pub const DUPLICATE_INCLUDE: u32 = 5;
    /// A temporary staging artifact could not be deleted.
    pub const CLEANUP_FAILED: u32 = 6;
    /// The output of a failed job could not be deleted.
    pub const OUTPUT_NOT_DELETED: u32 = 7;
    /// The jobfile contained no lines at all.
    pub const EMPTY_JOBFILE: u32 = 8;
    /// The jobfile does not end with a newline.
    pub const JOBFILE_NO_TRAILING_NEWLINE: u32 = 9;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single diagnostic record, emitted to the [`Reporter`] at the point of
/// detection. `line`/`col` of 0 mean "unknown".
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_id: Option<u32>,
}

/// Streaming sink for diagnostics. Formatting and printing live behind this
/// trait; the core never stores a diagnostic past the moment of emission.
pub trait Reporter {
    fn report(&mut self, diag: &Diagnostic);
}

/// Error/warning counts for one job run (or a whole batch).
///
/// Commutative monoid under `+` with `Tally::default()` as identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub errors: u32,
    pub warnings: u32,
}

impl Tally {
    pub fn new(errors: u32, warnings: u32) -> Self {
        Self { errors, warnings }
    }

    /// True if errors, warnings, or their sum exceed `threshold`.
    pub fn exceeds(&self, threshold: u32) -> bool {
        self.errors > threshold
            || self.warnings > threshold
            || self.errors + self.warnings > threshold
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Tally) -> Tally {
        Tally::new(self.errors + rhs.errors, self.warnings + rhs.warnings)
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Tally) {
        self.errors += rhs.errors;
        self.warnings += rhs.warnings;
    }
}

/// Per-job diagnostic front end: applies ID suppression, keeps the running
/// [`Tally`], and forwards everything else to the caller's [`Reporter`].
pub struct Diagnostics<'a> {
    reporter: &'a mut dyn Reporter,
    suppressed: HashSet<u32>,
    tally: Tally,
}

impl<'a> Diagnostics<'a> {
    pub fn new(reporter: &'a mut dyn Reporter, suppressed: &HashSet<u32>) -> Self {
        Self {
            reporter,
            suppressed: suppressed.clone(),
            tally: Tally::default(),
        }
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn error(&mut self, file: &str, message: impl Into<String>) {
        self.error_at(file, message, 0, 0);
    }

    pub fn error_at(&mut self, file: &str, message: impl Into<String>, line: usize, col: usize) {
        self.tally.errors += 1;
        let diag = Diagnostic {
            severity: Severity::Error,
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            warning_id: None,
        };
        log::debug!("{}:{}:{}: {}", diag.file, diag.line, diag.col, diag.message);
        self.reporter.report(&diag);
    }

    pub fn warning(&mut self, id: u32, file: &str, message: impl Into<String>) {
        self.warning_at(id, file, message, 0, 0);
    }

    /// Suppressed warnings are neither counted nor forwarded.
    pub fn warning_at(
        &mut self,
        id: u32,
        file: &str,
        message: impl Into<String>,
        line: usize,
        col: usize,
    ) {
        if self.suppressed.contains(&id) {
            return;
        }
        self.tally.warnings += 1;
        let diag = Diagnostic {
            severity: Severity::Warning,
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            warning_id: Some(id),
        };
        log::debug!("{}:{}:{}: {}", diag.file, diag.line, diag.col, diag.message);
        self.reporter.report(&diag);
    }

    pub fn info(&mut self, file: &str, message: impl Into<String>) {
        let diag = Diagnostic {
            severity: Severity::Info,
            file: file.to_string(),
            line: 0,
            col: 0,
            message: message.into(),
            warning_id: None,
        };
        self.reporter.report(&diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Collect(Vec<Diagnostic>);

    impl Reporter for Collect {
        fn report(&mut self, diag: &Diagnostic) {
            self.0.push(diag.clone());
        }
    }

    #[test]
    fn tally_is_a_monoid() {
        let a = Tally::new(1, 2);
        let b = Tally::new(3, 4);
        assert_eq!(a + b, b + a);
        assert_eq!(a + Tally::default(), a);
    }

    #[test]
    fn exceeds_checks_both_counts_and_sum() {
        assert!(Tally::new(7, 0).exceeds(6));
        assert!(Tally::new(0, 7).exceeds(6));
        assert!(Tally::new(4, 3).exceeds(6));
        assert!(!Tally::new(3, 3).exceeds(6));
    }

    #[test]
    fn suppressed_warnings_are_not_emitted_or_counted() {
        let mut collect = Collect::default();
        let suppressed: HashSet<u32> = [warning::DUPLICATE_INCLUDE].into_iter().collect();
        let mut diags = Diagnostics::new(&mut collect, &suppressed);

        diags.warning(warning::DUPLICATE_INCLUDE, "a.js", "dup");
        diags.warning(warning::RMN_OVERLAPPED_EOF, "a.js", "eof");

        assert_eq!(diags.tally(), Tally::new(0, 1));
        assert_eq!(collect.0.len(), 1);
        assert_eq!(collect.0[0].warning_id, Some(warning::RMN_OVERLAPPED_EOF));
    }
}
