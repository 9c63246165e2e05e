//! Most-recently-broken ratchet reporting.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use ratchet_analysis::{BaselineStore, Failure, RatchetSuite};
use ratchet_core::GitError;

use crate::adapter::{CommitRecord, GitAdapter};

/// A working-tree failure, optionally attributed to the commit that most
/// recently touched its file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokenRatchet {
    #[serde(flatten)]
    pub failure: Failure,
    /// Unset when the file has no commit history (untracked or new).
    pub commit: Option<CommitRecord>,
}

/// Evaluate the suite against the working tree under `root`, deduplicate
/// and sort the failures, and keep the first `limit`.
///
/// With an adapter supplied, each retained failure is attributed via the
/// most recent commit touching its file; files without history stay in
/// the result unattributed.
pub fn recently_broken(
    suite: &RatchetSuite,
    root: &Path,
    limit: usize,
    adapter: Option<&GitAdapter>,
) -> Result<Vec<BrokenRatchet>, GitError> {
    let report = suite.run(root, &BaselineStore::new());
    for err in &report.errors {
        warn!(error = %err, "file skipped while collecting recent failures");
    }

    let mut seen = HashSet::new();
    let mut failures: Vec<Failure> = report
        .all_failures()
        .filter(|f| seen.insert((*f).clone()))
        .cloned()
        .collect();
    failures.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
    failures.truncate(limit);

    failures
        .into_iter()
        .map(|failure| {
            let commit = match adapter {
                Some(adapter) => adapter.last_commit_for(&failure.path)?,
                None => None,
            };
            Ok(BrokenRatchet { failure, commit })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::process::Command;

    use ratchet_analysis::FileSelector;
    use ratchet_core::RuleConfig;

    fn print_suite() -> RatchetSuite {
        let config = RuleConfig {
            name: "no-print".to_string(),
            pattern: Some(r"\bprint\(".to_string()),
            ..RuleConfig::default()
        };
        RatchetSuite::new(&[config], FileSelector::with_defaults().unwrap()).unwrap()
    }

    #[test]
    fn limits_and_orders_by_path_then_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "print(1)\nok\nprint(2)\n").unwrap();
        fs::write(dir.path().join("b.py"), "print(3)\n").unwrap();

        let broken = recently_broken(&print_suite(), dir.path(), 2, None).unwrap();
        assert_eq!(broken.len(), 2);
        assert_eq!(broken[0].failure.path, Path::new("a.py"));
        assert_eq!(broken[0].failure.line_number, 1);
        assert_eq!(broken[1].failure.path, Path::new("a.py"));
        assert_eq!(broken[1].failure.line_number, 3);
        assert!(broken.iter().all(|b| b.commit.is_none()));
    }

    #[test]
    fn repeated_runs_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "print(1)\n").unwrap();

        let suite = print_suite();
        let first = recently_broken(&suite, dir.path(), 10, None).unwrap();
        let second = recently_broken(&suite, dir.path(), 10, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn attribution_resolves_commits_and_tolerates_untracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let git = |args: &[&str]| {
            let output = Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .output()
                .unwrap();
            assert!(output.status.success(), "git {args:?} failed");
        };
        git(&["init", "-b", "main"]);
        git(&["config", "user.email", "dev@example.com"]);
        git(&["config", "user.name", "Dev"]);
        fs::write(dir.path().join("tracked.py"), "print(1)\n").unwrap();
        git(&["add", "tracked.py"]);
        git(&["commit", "-m", "add tracked"]);
        fs::write(dir.path().join("untracked.py"), "print(2)\n").unwrap();

        let adapter = GitAdapter::open(dir.path()).unwrap();
        let broken = recently_broken(&print_suite(), dir.path(), 10, Some(&adapter)).unwrap();
        assert_eq!(broken.len(), 2);

        let tracked = broken
            .iter()
            .find(|b| b.failure.path == Path::new("tracked.py"))
            .unwrap();
        let commit = tracked.commit.as_ref().unwrap();
        assert_eq!(commit.message, "add tracked");
        assert!(commit.timestamp > 0);

        let untracked = broken
            .iter()
            .find(|b| b.failure.path == Path::new("untracked.py"))
            .unwrap();
        assert!(untracked.commit.is_none());
    }
}
