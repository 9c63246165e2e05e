//! Pattern-matching and violation-attribution engine.
//!
//! The pipeline: the [`selector::FileSelector`] decides which files are in
//! scope, each [`rules::RatchetTest`] scans them through its match
//! strategy (compiled patterns come from the shared
//! [`patterns::PatternCache`]), and the [`baseline::BaselineStore`]
//! supplies the allowed count that turns a raw violation count into a
//! pass/fail decision. The [`runner`] ties the pieces together for a
//! whole suite.

pub mod baseline;
pub mod patterns;
pub mod rules;
pub mod runner;
pub mod selector;

pub use baseline::BaselineStore;
pub use patterns::{Pattern, PatternCache};
pub use rules::{Failure, MatchStrategy, RatchetTest, SecondPassFragment};
pub use runner::{RatchetSuite, SuiteReport, TestOutcome};
pub use selector::FileSelector;
