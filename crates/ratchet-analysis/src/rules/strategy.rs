//! The four match strategies.

use std::path::Path;

use tracing::warn;

use crate::patterns::{Pattern, PatternCache};

use super::failure::Failure;
use super::fragment::SecondPassFragment;
use super::function_length::function_spans;

/// How a rule is evaluated against a file.
///
/// Patterns are compiled once when the rule is built; only two-pass rules
/// compile anything at scan time, and those derived patterns go through
/// the shared cache.
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    /// Match each line independently.
    Line { pattern: Pattern },
    /// Match a line followed immediately by a line matching `last`.
    AdjacentLine { first: Pattern, last: Pattern },
    /// Match the file contents as a single string.
    FullFile { pattern: Pattern },
    /// Match candidate lines, then confirm each by searching the lines
    /// below it for a derived pattern.
    TwoPass {
        first: Pattern,
        fragment: SecondPassFragment,
    },
    /// Report functions longer than `max_lines` lines.
    FunctionLength { max_lines: usize },
}

impl MatchStrategy {
    /// Evaluate this strategy over one file. Line numbers in the returned
    /// failures are 1-based; matched text is stored with trailing
    /// whitespace stripped.
    pub fn collect_failures(
        &self,
        test: &str,
        path: &Path,
        contents: &str,
        cache: &PatternCache,
    ) -> Vec<Failure> {
        match self {
            Self::Line { pattern } => scan_lines(test, path, contents, pattern),
            Self::AdjacentLine { first, last } => {
                let lines: Vec<&str> = contents.lines().map(str::trim_end).collect();
                let mut failures = Vec::new();
                for i in 0..lines.len().saturating_sub(1) {
                    if first.is_match(lines[i]) && last.is_match(lines[i + 1]) {
                        failures.push(Failure::new(
                            test,
                            path,
                            i + 1,
                            format!("{}\n{}", lines[i], lines[i + 1]),
                        ));
                    }
                }
                failures
            }
            Self::FullFile { pattern } => {
                if pattern.is_match(contents) {
                    vec![Failure::new(test, path, 1, contents.trim_end())]
                } else {
                    Vec::new()
                }
            }
            Self::TwoPass { first, fragment } => {
                let lines: Vec<&str> = contents.lines().map(str::trim_end).collect();
                let candidates = scan_lines(test, path, contents, first);
                let mut failures = Vec::new();
                for candidate in candidates {
                    let Some(source) = fragment.derive(&candidate) else {
                        continue;
                    };
                    let second = match cache.compile(&source, false) {
                        Ok(pattern) => pattern,
                        Err(err) => {
                            warn!(rule = test, pattern = %source, error = %err,
                                "derived second-pass pattern did not compile");
                            continue;
                        }
                    };
                    // Only lines strictly below the candidate confirm it.
                    if lines[candidate.line_number..]
                        .iter()
                        .any(|line| second.is_match(line))
                    {
                        failures.push(candidate);
                    }
                }
                failures
            }
            Self::FunctionLength { max_lines } => {
                if path.extension().and_then(|e| e.to_str()) != Some("py") {
                    return Vec::new();
                }
                function_spans(contents)
                    .into_iter()
                    .filter(|span| span.line_count() > *max_lines)
                    .map(|span| {
                        Failure::new(
                            test,
                            path,
                            span.start_line,
                            format!("def {}: {} lines", span.name, span.line_count()),
                        )
                    })
                    .collect()
            }
        }
    }
}

fn scan_lines(test: &str, path: &Path, contents: &str, pattern: &Pattern) -> Vec<Failure> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = raw.trim_end();
            pattern
                .is_match(line)
                .then(|| Failure::new(test, path, idx + 1, line))
        })
        .collect()
}
