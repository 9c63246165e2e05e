//! Suite comparison between two revisions.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use ratchet_analysis::{BaselineStore, RatchetSuite};
use ratchet_core::GitError;

use crate::adapter::GitAdapter;

/// Per-rule delta between two evaluated states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub test_name: String,
    pub current_count: u64,
    pub previous_count: u64,
    pub difference: i64,
    /// `+inf` when a rule went from zero to some violations; `0.0` when
    /// both counts are zero.
    pub percentage_change: f64,
    pub is_worse: bool,
}

/// Diff two count maps over the union of their rule names, sorted by
/// descending difference then rule name.
pub fn compare_counts(
    previous: &BTreeMap<String, u64>,
    current: &BTreeMap<String, u64>,
) -> Vec<ComparisonResult> {
    let mut names: Vec<&str> = previous.keys().chain(current.keys()).map(String::as_str).collect();
    names.sort_unstable();
    names.dedup();

    let mut results: Vec<ComparisonResult> = names
        .into_iter()
        .map(|name| {
            let previous_count = previous.get(name).copied().unwrap_or(0);
            let current_count = current.get(name).copied().unwrap_or(0);
            let difference = current_count as i64 - previous_count as i64;
            let percentage_change = if previous_count == 0 && current_count == 0 {
                0.0
            } else if previous_count == 0 {
                f64::INFINITY
            } else {
                difference as f64 / previous_count as f64 * 100.0
            };
            ComparisonResult {
                test_name: name.to_string(),
                current_count,
                previous_count,
                difference,
                percentage_change,
                is_worse: difference > 0,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.difference
            .cmp(&a.difference)
            .then_with(|| a.test_name.cmp(&b.test_name))
    });
    results
}

/// Check out `previous` and `current` in turn, evaluate the suite at
/// each, and diff the counts.
///
/// The two evaluations run strictly in sequence; each scoped checkout is
/// an exclusive critical section over the shared working tree.
pub fn compare_refs(
    adapter: &GitAdapter,
    suite: &RatchetSuite,
    previous: &str,
    current: &str,
) -> Result<Vec<ComparisonResult>, GitError> {
    let baseline = BaselineStore::new();
    let previous_counts = counts_at(adapter, suite, &baseline, previous)?;
    let current_counts = counts_at(adapter, suite, &baseline, current)?;
    info!(previous, current, "compared revisions");
    Ok(compare_counts(&previous_counts, &current_counts))
}

fn counts_at(
    adapter: &GitAdapter,
    suite: &RatchetSuite,
    baseline: &BaselineStore,
    revision: &str,
) -> Result<BTreeMap<String, u64>, GitError> {
    let guard = adapter.checkout_scoped(revision)?;
    let report = suite.run(adapter.repo_path(), baseline);
    for err in &report.errors {
        warn!(revision, error = %err, "file skipped during comparison");
    }
    let counts = report.counts();
    guard.restore()?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn zero_to_positive_is_infinite_percent() {
        let results = compare_counts(&counts(&[("a", 0)]), &counts(&[("a", 5)]));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].difference, 5);
        assert!(results[0].percentage_change.is_infinite());
        assert!(results[0].percentage_change.is_sign_positive());
        assert!(results[0].is_worse);
    }

    #[test]
    fn zero_to_zero_is_zero_percent() {
        let results = compare_counts(&counts(&[("a", 0)]), &counts(&[("a", 0)]));
        assert_eq!(results[0].percentage_change, 0.0);
        assert!(!results[0].is_worse);
    }

    #[test]
    fn improvement_is_not_worse() {
        let results = compare_counts(&counts(&[("a", 10)]), &counts(&[("a", 5)]));
        assert_eq!(results[0].difference, -5);
        assert_eq!(results[0].percentage_change, -50.0);
        assert!(!results[0].is_worse);
    }

    #[test]
    fn sorts_by_descending_difference_then_name() {
        let previous = counts(&[("a", 2), ("b", 0), ("c", 0), ("d", 5)]);
        let current = counts(&[("a", 4), ("b", 2), ("c", 1), ("d", 1)]);
        let results = compare_counts(&previous, &current);
        let order: Vec<&str> = results.iter().map(|r| r.test_name.as_str()).collect();
        // a and b both +2, tie broken by name; then c +1; then d -4.
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn missing_rule_counts_as_zero() {
        let results = compare_counts(&counts(&[("old", 3)]), &counts(&[("new", 2)]));
        let by_name: BTreeMap<&str, i64> = results
            .iter()
            .map(|r| (r.test_name.as_str(), r.difference))
            .collect();
        assert_eq!(by_name["old"], -3);
        assert_eq!(by_name["new"], 2);
    }

    mod end_to_end {
        use super::*;

        use std::fs;
        use std::path::Path;
        use std::process::Command;

        use ratchet_analysis::FileSelector;
        use ratchet_core::RuleConfig;

        fn git(dir: &Path, args: &[&str]) {
            let output = Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .unwrap();
            assert!(output.status.success(), "git {args:?} failed: {output:?}");
        }

        #[test]
        fn compares_two_commits() {
            let dir = tempfile::tempdir().unwrap();
            git(dir.path(), &["init", "-b", "main"]);
            git(dir.path(), &["config", "user.email", "dev@example.com"]);
            git(dir.path(), &["config", "user.name", "Dev"]);

            fs::write(dir.path().join("app.py"), "print(1)\n").unwrap();
            git(dir.path(), &["add", "."]);
            git(dir.path(), &["commit", "-m", "one print"]);

            fs::write(dir.path().join("app.py"), "print(1)\nprint(2)\nprint(3)\n").unwrap();
            git(dir.path(), &["add", "."]);
            git(dir.path(), &["commit", "-m", "three prints"]);

            let config = RuleConfig {
                name: "no-print".to_string(),
                pattern: Some(r"\bprint\(".to_string()),
                ..RuleConfig::default()
            };
            let suite =
                RatchetSuite::new(&[config], FileSelector::with_defaults().unwrap()).unwrap();
            let adapter = GitAdapter::open(dir.path()).unwrap();

            let results = compare_refs(&adapter, &suite, "HEAD~1", "HEAD").unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].previous_count, 1);
            assert_eq!(results[0].current_count, 3);
            assert_eq!(results[0].difference, 2);
            assert!(results[0].is_worse);
            // The working tree is back on the branch afterwards.
            assert_eq!(adapter.current_branch().unwrap(), "main");

            // Comparing again, including the checkout of `HEAD` itself,
            // must leave the branch checked out too.
            let again = compare_refs(&adapter, &suite, "HEAD~1", "HEAD").unwrap();
            assert_eq!(again, results);
            assert_eq!(adapter.current_branch().unwrap(), "main");
            assert!(!adapter.is_detached_head().unwrap());
        }
    }
}
