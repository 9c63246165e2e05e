//! Error handling for the ratchet engine.
//! One `thiserror` enum per subsystem; library code never erases types.

pub mod config_error;
pub mod git_error;
pub mod scan_error;

pub use config_error::ConfigError;
pub use git_error::GitError;
pub use scan_error::ScanError;

/// Top-level error aggregating subsystem errors via `From` conversions.
///
/// Baseline regressions are deliberately *not* represented here: a test
/// whose count exceeds its allowed count is a normal evaluation outcome,
/// surfaced as data, never as an error.
#[derive(Debug, thiserror::Error)]
pub enum RatchetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),
}
