//! Suite evaluation over a file tree.
//!
//! The runner walks the tree once, reads each candidate file once, and
//! feeds it to every rule whose selector accepts it. Per-file read
//! problems are accumulated alongside the partial results instead of
//! aborting the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::GlobMatcher;
use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, info};

use ratchet_core::{ConfigError, RuleConfig, RulesFile, ScanError};

use crate::baseline::BaselineStore;
use crate::patterns::PatternCache;
use crate::rules::{Failure, RatchetTest};
use crate::selector::{compile_include, FileSelector};

/// Result of evaluating one rule over the selected files.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub name: String,
    pub failures: Vec<Failure>,
    pub total_count: u64,
    pub allowed_count: u64,
}

impl TestOutcome {
    /// The ratchet check: more failures than the baseline allows.
    pub fn is_regression(&self) -> bool {
        self.total_count > self.allowed_count
    }

    pub fn excess(&self) -> u64 {
        self.total_count.saturating_sub(self.allowed_count)
    }
}

/// Everything one run produced: per-rule outcomes plus the files that
/// could not be read.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub outcomes: Vec<TestOutcome>,
    pub errors: Vec<ScanError>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| !o.is_regression())
    }

    pub fn regressions(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| o.is_regression())
    }

    /// Current totals keyed by rule name.
    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.outcomes
            .iter()
            .map(|o| (o.name.clone(), o.total_count))
            .collect()
    }

    pub fn all_failures(&self) -> impl Iterator<Item = &Failure> {
        self.outcomes.iter().flat_map(|o| o.failures.iter())
    }
}

/// A compiled set of rules bound to a file selector.
pub struct RatchetSuite {
    tests: Vec<RatchetTest>,
    includes: Vec<Option<GlobMatcher>>,
    selector: FileSelector,
    cache: PatternCache,
}

impl RatchetSuite {
    /// Compile enabled rule configs into a runnable suite. Any pattern or
    /// example problem is fatal here.
    pub fn new(configs: &[RuleConfig], selector: FileSelector) -> Result<Self, ConfigError> {
        let cache = PatternCache::new();
        let mut tests = Vec::new();
        let mut includes = Vec::new();
        for config in configs.iter().filter(|c| c.enabled) {
            let test = RatchetTest::from_config(config, &cache)?;
            let include = match &test.include_path {
                Some(pattern) => Some(compile_include(test.name(), pattern)?),
                None => None,
            };
            tests.push(test);
            includes.push(include);
        }
        info!(rules = tests.len(), "suite compiled");
        Ok(Self {
            tests,
            includes,
            selector,
            cache,
        })
    }

    pub fn from_rules(rules: &RulesFile, selector: FileSelector) -> Result<Self, ConfigError> {
        rules.validate()?;
        Self::new(&rules.rules, selector)
    }

    pub fn tests(&self) -> &[RatchetTest] {
        &self.tests
    }

    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }

    /// Walk `root` and return every file some rule would look at, sorted
    /// by relative path, with walk errors collected separately.
    pub fn collect_files(&self, root: &Path) -> (Vec<PathBuf>, Vec<ScanError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkBuilder::new(root).standard_filters(false).build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    errors.push(ScanError::Walk {
                        root: root.to_path_buf(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };
            if self.any_rule_wants(&relative) {
                files.push(relative);
            }
        }

        files.sort();
        (files, errors)
    }

    fn any_rule_wants(&self, relative: &Path) -> bool {
        self.tests.iter().zip(&self.includes).any(|(test, include)| {
            self.selector
                .should_include(relative, include.as_ref(), test.exclude_test_files)
        })
    }

    /// Evaluate every rule against the tree under `root`. Each rule's
    /// failure list is rebuilt from scratch; nothing carries over from a
    /// previous run.
    pub fn run(&self, root: &Path, baseline: &BaselineStore) -> SuiteReport {
        let (files, mut errors) = self.collect_files(root);
        debug!(files = files.len(), "scanning");

        let mut failures: Vec<Vec<Failure>> = vec![Vec::new(); self.tests.len()];
        for relative in &files {
            let contents = match std::fs::read_to_string(root.join(relative)) {
                Ok(contents) => contents,
                Err(err) => {
                    errors.push(ScanError::from_io(relative.clone(), err));
                    continue;
                }
            };
            for (idx, (test, include)) in self.tests.iter().zip(&self.includes).enumerate() {
                if self
                    .selector
                    .should_include(relative, include.as_ref(), test.exclude_test_files)
                {
                    failures[idx].extend(test.collect_failures(relative, &contents, &self.cache));
                }
            }
        }

        let outcomes = self
            .tests
            .iter()
            .zip(failures)
            .map(|(test, failures)| {
                let total_count = failures.len() as u64;
                TestOutcome {
                    name: test.name().to_string(),
                    allowed_count: test.allowed_count.unwrap_or_else(|| baseline.allowed(test.name())),
                    total_count,
                    failures,
                }
            })
            .collect();

        SuiteReport { outcomes, errors }
    }

    /// Re-count the tree and persist the totals as the new baseline.
    /// This is the only path that moves allowed counts.
    pub fn update_baseline(&self, root: &Path, baseline: &mut BaselineStore) -> SuiteReport {
        let report = self.run(root, baseline);
        for outcome in &report.outcomes {
            baseline.set(outcome.name.clone(), outcome.total_count);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use ratchet_core::RuleKind;

    fn print_rule() -> RuleConfig {
        RuleConfig {
            name: "no-print".to_string(),
            kind: RuleKind::Line,
            pattern: Some(r"\bprint\(".to_string()),
            exclude_test_files: true,
            ..RuleConfig::default()
        }
    }

    fn suite(configs: &[RuleConfig]) -> RatchetSuite {
        RatchetSuite::new(configs, FileSelector::with_defaults().unwrap()).unwrap()
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn counts_failures_across_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "print(1)\nx = 2\n");
        write(dir.path(), "pkg/util.py", "print(2)\nprint(3)\n");

        let suite = suite(&[print_rule()]);
        let report = suite.run(dir.path(), &BaselineStore::new());
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].total_count, 3);
        assert!(!report.passed());
    }

    #[test]
    fn excluded_and_test_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "print(1)\n");
        write(dir.path(), "test_app.py", "print(2)\n");
        write(dir.path(), "venv/lib.py", "print(3)\n");

        let suite = suite(&[print_rule()]);
        let report = suite.run(dir.path(), &BaselineStore::new());
        assert_eq!(report.outcomes[0].total_count, 1);
        assert_eq!(report.outcomes[0].failures[0].path, Path::new("app.py"));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "print(1)\n");
        write(dir.path(), "b.py", "print(2)\nprint(3)\n");

        let suite = suite(&[print_rule()]);
        let baseline = BaselineStore::new();
        let first = suite.run(dir.path(), &baseline);
        let second = suite.run(dir.path(), &baseline);
        assert_eq!(first.outcomes[0].failures, second.outcomes[0].failures);
    }

    #[test]
    fn update_baseline_reaches_a_fixed_point() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "print(1)\nprint(2)\n");

        let suite = suite(&[print_rule()]);
        let mut baseline = BaselineStore::new();
        suite.update_baseline(dir.path(), &mut baseline);
        assert_eq!(baseline.get("no-print"), Some(2));

        let report = suite.run(dir.path(), &baseline);
        assert_eq!(report.outcomes[0].total_count, report.outcomes[0].allowed_count);
        assert!(report.passed());
    }

    #[test]
    fn explicit_allowed_count_overrides_the_baseline() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "print(1)\n");

        let config = RuleConfig {
            allowed_count: Some(5),
            ..print_rule()
        };
        let suite = suite(&[config]);
        let mut baseline = BaselineStore::new();
        baseline.set("no-print", 0);
        let report = suite.run(dir.path(), &baseline);
        assert_eq!(report.outcomes[0].allowed_count, 5);
        assert!(report.passed());
    }

    #[test]
    fn unreadable_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.py", "print(1)\n");
        fs::write(dir.path().join("bad.py"), [0xff, 0xfe, 0x01]).unwrap();

        let suite = suite(&[print_rule()]);
        let report = suite.run(dir.path(), &BaselineStore::new());
        assert_eq!(report.outcomes[0].total_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], ScanError::NonUtf8 { .. }));
    }

    #[test]
    fn include_path_scopes_a_rule() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", "print(1)\n");
        write(dir.path(), "scripts/tool.py", "print(2)\n");

        let config = RuleConfig {
            include_path: Some("src/**".to_string()),
            ..print_rule()
        };
        let suite = suite(&[config]);
        let report = suite.run(dir.path(), &BaselineStore::new());
        assert_eq!(report.outcomes[0].total_count, 1);
        assert_eq!(report.outcomes[0].failures[0].path, Path::new("src/app.py"));
    }
}
