//! A compiled, runnable rule.

use std::path::Path;

use ratchet_core::{ConfigError, FragmentKind, RuleConfig, RuleKind};

use crate::patterns::PatternCache;

use super::failure::Failure;
use super::fragment::SecondPassFragment;
use super::strategy::MatchStrategy;

/// A rule with its patterns compiled and its strategy resolved.
///
/// Construction validates the config and compiles every pattern, so a
/// `RatchetTest` that exists can always be evaluated.
#[derive(Debug, Clone)]
pub struct RatchetTest {
    name: String,
    strategy: MatchStrategy,
    pub exclude_test_files: bool,
    pub include_path: Option<String>,
    /// Overrides the stored baseline when set.
    pub allowed_count: Option<u64>,
    pub description: String,
    match_examples: Vec<String>,
    non_match_examples: Vec<String>,
}

impl RatchetTest {
    /// Compile a rule config into a runnable test.
    pub fn from_config(config: &RuleConfig, cache: &PatternCache) -> Result<Self, ConfigError> {
        config.validate()?;

        let compile = |source: &str| {
            cache
                .compile(source, false)
                .map_err(|err| ConfigError::InvalidPattern {
                    rule: config.name.clone(),
                    message: err.to_string(),
                })
        };

        let strategy = match config.kind {
            RuleKind::Line => MatchStrategy::Line {
                pattern: compile(config.pattern.as_deref().unwrap_or_default())?,
            },
            RuleKind::AdjacentLine => MatchStrategy::AdjacentLine {
                first: compile(config.pattern.as_deref().unwrap_or_default())?,
                last: compile(config.last_line_pattern.as_deref().unwrap_or(".*"))?,
            },
            RuleKind::FullFile => {
                let source = config.pattern.as_deref().unwrap_or_default();
                let pattern = cache.compile_with_flags(source, config.flags).map_err(|err| {
                    ConfigError::InvalidPattern {
                        rule: config.name.clone(),
                        message: err.to_string(),
                    }
                })?;
                MatchStrategy::FullFile { pattern }
            }
            RuleKind::TwoPass => {
                let fragment = match config.fragment {
                    Some(FragmentKind::SelfReference) => SecondPassFragment::SelfReference,
                    Some(FragmentKind::ModuleImport) => SecondPassFragment::ModuleImport,
                    None => {
                        let source = config.second_pass_pattern.as_deref().unwrap_or_default();
                        compile(source)?;
                        SecondPassFragment::Static(source.to_string())
                    }
                };
                MatchStrategy::TwoPass {
                    first: compile(config.pattern.as_deref().unwrap_or_default())?,
                    fragment,
                }
            }
            RuleKind::FunctionLength => MatchStrategy::FunctionLength {
                max_lines: config.max_lines.unwrap_or_default(),
            },
        };

        // Fragment rules derive the second pass from first-pass capture
        // text, which an isolated example cannot exercise. When a static
        // second pass is also configured it stands in for validation.
        let validation_strategy = match (config.kind, config.fragment, &config.second_pass_pattern)
        {
            (RuleKind::TwoPass, Some(_), Some(source)) => {
                compile(source.as_str())?;
                Some(MatchStrategy::TwoPass {
                    first: compile(config.pattern.as_deref().unwrap_or_default())?,
                    fragment: SecondPassFragment::Static(source.clone()),
                })
            }
            _ => None,
        };

        let test = Self {
            name: config.name.clone(),
            strategy,
            exclude_test_files: config.exclude_test_files,
            include_path: config.include_path.clone(),
            allowed_count: config.allowed_count,
            description: config.description.clone(),
            match_examples: config.match_examples.clone(),
            non_match_examples: config.non_match_examples.clone(),
        };
        test.check_examples(validation_strategy.as_ref().unwrap_or(&test.strategy), cache)?;
        Ok(test)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    /// Run this test over one file's contents.
    pub fn collect_failures(
        &self,
        path: &Path,
        contents: &str,
        cache: &PatternCache,
    ) -> Vec<Failure> {
        self.strategy
            .collect_failures(&self.name, path, contents, cache)
    }

    /// Check declared examples against the compiled strategy. Every match
    /// example must produce exactly one failure and every non-match
    /// example must produce none.
    pub fn validate_examples(&self, cache: &PatternCache) -> Result<(), ConfigError> {
        self.check_examples(&self.strategy, cache)
    }

    fn check_examples(
        &self,
        strategy: &MatchStrategy,
        cache: &PatternCache,
    ) -> Result<(), ConfigError> {
        let example_path = Path::new("example.py");
        for example in &self.match_examples {
            let count = strategy
                .collect_failures(&self.name, example_path, example, cache)
                .len();
            if count == 0 {
                return Err(ConfigError::ExampleDidNotMatch {
                    rule: self.name.clone(),
                    example: example.clone(),
                });
            }
            if count > 1 {
                return Err(ConfigError::InvalidValue {
                    rule: self.name.clone(),
                    field: "match_examples".to_string(),
                    message: format!("example produced {count} failures, expected exactly 1"),
                });
            }
        }
        for example in &self.non_match_examples {
            if !strategy
                .collect_failures(&self.name, example_path, example, cache)
                .is_empty()
            {
                return Err(ConfigError::ExampleMatched {
                    rule: self.name.clone(),
                    example: example.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_rule(pattern: &str) -> RuleConfig {
        RuleConfig {
            name: "sample".to_string(),
            pattern: Some(pattern.to_string()),
            ..RuleConfig::default()
        }
    }

    #[test]
    fn builds_line_test_and_collects() {
        let cache = PatternCache::new();
        let test = RatchetTest::from_config(&line_rule(r"print\("), &cache).unwrap();
        let failures = test.collect_failures(Path::new("a.py"), "print(1)\n", &cache);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].test, "sample");
    }

    #[test]
    fn match_example_must_match() {
        let cache = PatternCache::new();
        let config = RuleConfig {
            match_examples: vec!["logger.info(x)".to_string()],
            ..line_rule(r"print\(")
        };
        let err = RatchetTest::from_config(&config, &cache).unwrap_err();
        assert!(matches!(err, ConfigError::ExampleDidNotMatch { .. }));
    }

    #[test]
    fn non_match_example_must_not_match() {
        let cache = PatternCache::new();
        let config = RuleConfig {
            non_match_examples: vec!["print(x)".to_string()],
            ..line_rule(r"print\(")
        };
        let err = RatchetTest::from_config(&config, &cache).unwrap_err();
        assert!(matches!(err, ConfigError::ExampleMatched { .. }));
    }

    #[test]
    fn well_behaved_examples_pass() {
        let cache = PatternCache::new();
        let config = RuleConfig {
            match_examples: vec!["print('hi')".to_string()],
            non_match_examples: vec!["logger.info('hi')".to_string()],
            ..line_rule(r"print\(")
        };
        assert!(RatchetTest::from_config(&config, &cache).is_ok());
    }

    #[test]
    fn match_example_matching_twice_is_rejected() {
        let cache = PatternCache::new();
        let config = RuleConfig {
            match_examples: vec!["print(a)\nprint(b)".to_string()],
            ..line_rule(r"print\(")
        };
        let err = RatchetTest::from_config(&config, &cache).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn two_pass_examples_use_static_pattern() {
        let cache = PatternCache::new();
        let config = RuleConfig {
            name: "corr".to_string(),
            kind: ratchet_core::RuleKind::TwoPass,
            pattern: Some(r"class \w+:".to_string()),
            second_pass_pattern: Some(r"self\.\w+\.".to_string()),
            match_examples: vec!["class Foo:\n    self.bar.call()".to_string()],
            non_match_examples: vec!["class Foo:\n    pass".to_string()],
            ..RuleConfig::default()
        };
        assert!(RatchetTest::from_config(&config, &cache).is_ok());
    }

    #[test]
    fn fragment_rule_examples_validate_against_static_second_pass() {
        let cache = PatternCache::new();
        let config = RuleConfig {
            name: "coupling".to_string(),
            kind: ratchet_core::RuleKind::TwoPass,
            pattern: Some(r"class (\w+):".to_string()),
            fragment: Some(ratchet_core::FragmentKind::SelfReference),
            second_pass_pattern: Some(r"self\.\w+\.".to_string()),
            // Matches the static pattern but not the derived fragment,
            // which would be `self\.Foo\.` here.
            match_examples: vec!["class Foo:\n    self.other.call()".to_string()],
            non_match_examples: vec!["class Foo:\n    pass".to_string()],
            ..RuleConfig::default()
        };
        let test = RatchetTest::from_config(&config, &cache).unwrap();

        // Evaluation still uses the derived fragment.
        let failures =
            test.collect_failures(Path::new("a.py"), "class Foo:\n    self.other.call()", &cache);
        assert!(failures.is_empty());
        let failures = test.collect_failures(
            Path::new("a.py"),
            "class Foo:\n    self.Foo.helper()",
            &cache,
        );
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn invalid_pattern_is_rejected_with_rule_name() {
        let cache = PatternCache::new();
        let err = RatchetTest::from_config(&line_rule(r"(unclosed"), &cache).unwrap_err();
        match err {
            ConfigError::InvalidPattern { rule, .. } => assert_eq!(rule, "sample"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
