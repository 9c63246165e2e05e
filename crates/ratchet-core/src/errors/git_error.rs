//! Version-control errors, classified by meaning.
//!
//! Operations that are unsafe in a given repository state (for example
//! listing changed files while conflicts exist) refuse with a specific
//! variant instead of returning a misleading empty result.

use std::path::PathBuf;

/// Errors produced by the VCS adapter and the subsystems built on it.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Not a git repository: {path}")]
    NotARepository { path: PathBuf },

    #[error("Repository is in detached HEAD state")]
    DetachedHead,

    #[error("Repository has unresolved merge conflicts")]
    MergeConflicts,

    #[error("Invalid git revision: {revision}")]
    InvalidRevision { revision: String },

    #[error("Unsafe characters in git argument: {argument:?}")]
    UnsafeArgument { argument: String },

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Could not parse git output from `git {command}`: {message}")]
    InvalidOutput { command: String, message: String },

    #[error("File {path} is not inside the repository")]
    OutsideRepository { path: PathBuf },

    #[error("Failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),
}
