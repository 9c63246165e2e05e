//! Rule configuration loading and validation.

pub mod rule_config;

pub use rule_config::{FragmentKind, MatchFlags, RuleConfig, RuleKind, RulesFile};
