//! Builtin rule catalog.
//!
//! A starter set of rules for Python codebases. Projects typically extend
//! or replace these from their rules file; the sentinel rule stays useful
//! everywhere because it proves the engine is actually scanning.

use ratchet_core::{FragmentKind, MatchFlags, RuleConfig, RuleKind};

/// Token the sentinel rule matches. Committed exactly once on purpose, so
/// a scan that reports zero sentinel hits means scanning is broken.
pub const SENTINEL_TOKEN: &str = "RATCHET_SENTINEL_KEEP";

pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig {
            name: "no-print".to_string(),
            kind: RuleKind::Line,
            pattern: Some(r"\bprint\(".to_string()),
            description: "print() calls belong in scripts, not library code".to_string(),
            match_examples: vec!["print('debugging')".to_string()],
            non_match_examples: vec!["logger.info('message')".to_string()],
            exclude_test_files: true,
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "no-pdb".to_string(),
            kind: RuleKind::Line,
            pattern: Some(r"\bpdb\.set_trace\(|\bimport pdb\b".to_string()),
            description: "leftover debugger invocations".to_string(),
            match_examples: vec![
                "import pdb".to_string(),
                "pdb.set_trace()".to_string(),
            ],
            non_match_examples: vec!["import pdbutils".to_string()],
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "no-bare-except".to_string(),
            kind: RuleKind::Line,
            pattern: Some(r"except\s*:".to_string()),
            description: "bare except clauses swallow every error".to_string(),
            match_examples: vec!["except:".to_string(), "except :".to_string()],
            non_match_examples: vec!["except ValueError:".to_string()],
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "no-merge-markers".to_string(),
            kind: RuleKind::Line,
            pattern: Some(r"^<{7} |^>{7} |^={7}$".to_string()),
            description: "unresolved merge conflict markers".to_string(),
            match_examples: vec!["<<<<<<< HEAD".to_string()],
            non_match_examples: vec!["x = a <= b".to_string()],
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "import-then-shadow-os".to_string(),
            kind: RuleKind::AdjacentLine,
            pattern: Some(r"^import os$".to_string()),
            last_line_pattern: Some(r"^os = ".to_string()),
            description: "importing os and immediately shadowing it".to_string(),
            match_examples: vec!["import os\nos = fake_os".to_string()],
            non_match_examples: vec!["import os\nos.remove(path)".to_string()],
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "no-gpl-license-text".to_string(),
            kind: RuleKind::FullFile,
            pattern: Some(r"gnu general public license".to_string()),
            flags: MatchFlags {
                case_insensitive: true,
                dot_all: true,
                ..MatchFlags::default()
            },
            description: "vendored GPL-licensed sources".to_string(),
            match_examples: vec!["Released under the\nGNU General Public License".to_string()],
            non_match_examples: vec!["MIT License".to_string()],
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "class-self-coupling".to_string(),
            kind: RuleKind::TwoPass,
            pattern: Some(r"^class \w+[:(]".to_string()),
            fragment: Some(FragmentKind::SelfReference),
            second_pass_pattern: Some(r"self\.\w+\.".to_string()),
            description: "classes that reference themselves through self".to_string(),
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "long-function".to_string(),
            kind: RuleKind::FunctionLength,
            max_lines: Some(50),
            description: "functions longer than 50 lines".to_string(),
            ..RuleConfig::default()
        },
        RuleConfig {
            name: "sentinel".to_string(),
            kind: RuleKind::Line,
            pattern: Some(SENTINEL_TOKEN.to_string()),
            description: "self-check; exactly one hit proves scanning works".to_string(),
            match_examples: vec![format!("marker = '{SENTINEL_TOKEN}'")],
            ..RuleConfig::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternCache;
    use crate::rules::RatchetTest;

    #[test]
    fn every_builtin_compiles_with_valid_examples() {
        let cache = PatternCache::new();
        for config in default_rules() {
            let name = config.name.clone();
            assert!(
                RatchetTest::from_config(&config, &cache).is_ok(),
                "builtin rule '{name}' failed to compile"
            );
        }
    }

    #[test]
    fn builtin_names_are_unique() {
        let rules = default_rules();
        let mut names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), rules.len());
    }
}
