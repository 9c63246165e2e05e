//! Declarative rule definitions, loaded from `ratchet.yml`.
//!
//! Validation happens here, at construction time: an invalid pattern, a
//! missing required field, or a contradictory two-pass setup is a
//! `ConfigError`, never a runtime evaluation error. Configuration
//! inheritance, merging, and environment-variable substitution are
//! deliberately not supported.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Which match strategy a rule uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// Match each line independently.
    #[default]
    Line,
    /// Match a line only when the previous line also matched.
    AdjacentLine,
    /// Match against the whole file joined into one blob.
    FullFile,
    /// Correlate a first-pass structural match with a derived pattern
    /// searched on the lines that follow it.
    TwoPass,
    /// Flag functions longer than `max_lines`, using a parse tree.
    FunctionLength,
}

/// Regex compilation flags for full-file rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MatchFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_all: bool,
}

/// Named strategies for deriving a second-pass pattern fragment from a
/// first-pass failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
    /// `class Foo:` on the failing line becomes `self\.Foo\.`.
    SelfReference,
    /// The failing file's module path becomes a set of import patterns.
    ModuleImport,
}

/// One rule entry in the rules file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub name: String,
    pub kind: RuleKind,
    pub pattern: Option<String>,
    /// Second pattern for `adjacent-line` rules; defaults to match-everything.
    pub last_line_pattern: Option<String>,
    pub flags: MatchFlags,
    /// Static second-pass pattern for `two-pass` rules; used for example
    /// validation and as the fallback when no fragment kind is set.
    pub second_pass_pattern: Option<String>,
    pub fragment: Option<FragmentKind>,
    /// Maximum function length for `function-length` rules.
    pub max_lines: Option<usize>,
    /// Overrides the baseline store; when absent the stored count is used.
    pub allowed_count: Option<u64>,
    pub exclude_test_files: bool,
    /// Glob the file path must match for this rule to apply.
    pub include_path: Option<String>,
    pub match_examples: Vec<String>,
    pub non_match_examples: Vec<String>,
    pub description: String,
    pub enabled: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: RuleKind::Line,
            pattern: None,
            last_line_pattern: None,
            flags: MatchFlags::default(),
            second_pass_pattern: None,
            fragment: None,
            max_lines: None,
            allowed_count: None,
            exclude_test_files: false,
            include_path: None,
            match_examples: Vec::new(),
            non_match_examples: Vec::new(),
            description: String::new(),
            enabled: true,
        }
    }
}

impl RuleConfig {
    /// Validate structural requirements. Pattern *syntax* is checked here;
    /// example behavior is checked when the rule is compiled into a test.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField {
                rule: "<unnamed>".to_string(),
                field: "name".to_string(),
            });
        }

        match self.kind {
            RuleKind::Line | RuleKind::AdjacentLine | RuleKind::FullFile => {
                let pattern = self.require_pattern()?;
                check_pattern(&self.name, pattern)?;
                if let Some(ref last) = self.last_line_pattern {
                    check_pattern(&self.name, last)?;
                }
            }
            RuleKind::TwoPass => {
                let pattern = self.require_pattern()?;
                check_pattern(&self.name, pattern)?;
                if self.second_pass_pattern.is_none() && self.fragment.is_none() {
                    return Err(ConfigError::MissingField {
                        rule: self.name.clone(),
                        field: "second_pass_pattern".to_string(),
                    });
                }
                if let Some(ref second) = self.second_pass_pattern {
                    check_pattern(&self.name, second)?;
                }
            }
            RuleKind::FunctionLength => {
                let max = self.max_lines.ok_or_else(|| ConfigError::MissingField {
                    rule: self.name.clone(),
                    field: "max_lines".to_string(),
                })?;
                if max == 0 {
                    return Err(ConfigError::InvalidValue {
                        rule: self.name.clone(),
                        field: "max_lines".to_string(),
                        message: "must be greater than 0".to_string(),
                    });
                }
            }
        }

        if let Some(ref include) = self.include_path {
            if include.is_empty() {
                return Err(ConfigError::InvalidValue {
                    rule: self.name.clone(),
                    field: "include_path".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    fn require_pattern(&self) -> Result<&str, ConfigError> {
        self.pattern
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                rule: self.name.clone(),
                field: "pattern".to_string(),
            })
    }
}

fn check_pattern(rule: &str, pattern: &str) -> Result<(), ConfigError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern {
            rule: rule.to_string(),
            message: e.to_string(),
        })
}

/// The whole rules document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RulesFile {
    /// Load and validate a YAML rules file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
        Self::from_yaml(&content, &path.display().to_string())
    }

    /// Parse a YAML rules document from a string.
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: RulesFile =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: origin.to_string(),
                message: e.to_string(),
            })?;
        file.validate()?;
        Ok(file)
    }

    /// Validate every rule and reject duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateRule {
                    rule: rule.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The enabled rules, in declaration order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &RuleConfig> {
        self.rules.iter().filter(|r| r.enabled)
    }
}
