//! Persisted allowed-count baseline.
//!
//! A flat JSON document mapping rule name to the violation count the
//! project currently tolerates. Evaluation only reads it; the counts move
//! through an explicit update operation, never as a side effect of a
//! scan.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use ratchet_core::{ConfigError, ScanError};

/// Default file name for the baseline document at the project root.
pub const BASELINE_FILE_NAME: &str = "ratchet_values.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineStore {
    counts: BTreeMap<String, u64>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty baseline, not an
    /// error; a file that exists but does not parse is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(err) => {
                return Err(ConfigError::ParseError {
                    path: path.display().to_string(),
                    message: err.to_string(),
                })
            }
        };
        serde_json::from_str(&contents).map_err(|err| ConfigError::ParseError {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    /// Write as pretty-printed JSON with a trailing newline.
    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        let mut body = serde_json::to_string_pretty(&self.counts).map_err(|err| ScanError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })?;
        body.push('\n');
        std::fs::write(path, body).map_err(|err| ScanError::from_io(path.to_path_buf(), err))?;
        info!(path = %path.display(), entries = self.counts.len(), "baseline written");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counts.get(name).copied()
    }

    /// Allowed count for a rule; rules never recorded get 0, so any
    /// violation of a new rule is a regression until a baseline is taken.
    pub fn allowed(&self, name: &str) -> u64 {
        self.get(name).unwrap_or(0)
    }

    pub fn set(&mut self, name: impl Into<String>, count: u64) {
        self.counts.insert(name.into(), count);
    }

    pub fn remove(&mut self, name: &str) -> Option<u64> {
        self.counts.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }
}
