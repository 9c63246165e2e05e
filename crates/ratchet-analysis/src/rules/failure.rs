//! A single recorded violation.

use std::path::PathBuf;

use serde::Serialize;

/// One location where a rule matched.
///
/// Line numbers are 1-based. For whole-file matches the line number is 1
/// and `line` holds the full file contents; for adjacent-line matches it
/// is the earlier line's number and `line` holds both lines joined with a
/// newline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Failure {
    /// Name of the rule that matched.
    pub test: String,
    /// Path of the offending file, relative to the scan root.
    pub path: PathBuf,
    pub line_number: usize,
    /// The matched text, trailing whitespace stripped.
    pub line: String,
}

impl Failure {
    pub fn new(
        test: impl Into<String>,
        path: impl Into<PathBuf>,
        line_number: usize,
        line: impl Into<String>,
    ) -> Self {
        Self {
            test: test.into(),
            path: path.into(),
            line_number,
            line: line.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.path.display(),
            self.line_number,
            self.test,
            self.line
        )
    }
}
