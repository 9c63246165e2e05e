//! Core types, errors, and configuration for the ratchet quality-gate engine.
//!
//! A ratchet forbids the *count* of pattern violations in a codebase from
//! increasing while tolerating pre-existing violations below a stored
//! baseline. This crate holds the pieces every other crate depends on:
//! the error taxonomy and the rule/engine configuration model.

pub mod config;
pub mod errors;

pub use config::{FragmentKind, MatchFlags, RuleConfig, RuleKind, RulesFile};
pub use errors::{ConfigError, GitError, RatchetError, ScanError};
