//! Compiled pattern cache.

pub mod cache;

pub use cache::{Pattern, PatternCache};
