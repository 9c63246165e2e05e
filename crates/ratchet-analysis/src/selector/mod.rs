//! File selection: default exclusions, the project exclusion file, and
//! per-rule include filters.

use std::io::Read;
use std::path::Path;

use globset::{Glob, GlobMatcher};
use tracing::debug;

use ratchet_core::{ConfigError, ScanError};

/// Name of the project-level exclusion file, looked up at the scan root.
pub const EXCLUDE_FILE_NAME: &str = "ratchet_excluded.txt";

/// Exclusions applied when the project does not override them.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "*.pyc",
    "__pycache__/",
    "venv/",
    "*.egg-info/",
    "build/",
    "dist/",
    ".git/",
    ".tox/",
    ".pytest_cache/",
    ".mypy_cache/",
    ".coverage",
    "htmlcov/",
    "*.so",
    "*.pyd",
    "*.dll",
    "*.dylib",
];

/// One parsed exclusion pattern.
///
/// Directory patterns (trailing `/`) match any single path component.
/// Negations (leading `!`) rescue a path from file-glob exclusion, but a
/// bare-filename negation only rescues root-level files. File globs match
/// the full relative path when they contain `/`, the bare filename
/// otherwise.
#[derive(Debug, Clone)]
enum ExcludePattern {
    Directory(GlobMatcher),
    Negation { matcher: GlobMatcher, anchored: bool },
    File { matcher: GlobMatcher, anchored: bool },
}

/// Decides which files are in scope for a scan.
#[derive(Debug, Clone, Default)]
pub struct FileSelector {
    patterns: Vec<ExcludePattern>,
}

impl FileSelector {
    /// Build a selector from raw pattern lines, custom patterns first.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let mut parsed = Vec::with_capacity(patterns.len());
        for raw in patterns {
            parsed.push(parse_pattern(raw.as_ref())?);
        }
        Ok(Self { patterns: parsed })
    }

    /// Selector using only [`DEFAULT_EXCLUDE_PATTERNS`].
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(DEFAULT_EXCLUDE_PATTERNS)
    }

    /// Read the exclusion file under `root` (if any) and append the
    /// default patterns after it.
    pub fn for_root(root: &Path) -> Result<Self, ConfigError> {
        let mut patterns = match read_exclude_patterns(&root.join(EXCLUDE_FILE_NAME)) {
            Ok(patterns) => patterns,
            Err(err) => {
                return Err(ConfigError::ParseError {
                    path: EXCLUDE_FILE_NAME.to_string(),
                    message: err.to_string(),
                })
            }
        };
        patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()));
        debug!(count = patterns.len(), "loaded exclusion patterns");
        Self::new(&patterns)
    }

    /// Whether `path` (relative to the scan root) is excluded by the
    /// configured patterns alone, ignoring per-rule filters.
    ///
    /// Directory patterns win over everything; negations rescue from file
    /// globs only.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        let filename = file_name(&normalized);

        for pattern in &self.patterns {
            if let ExcludePattern::Directory(matcher) = pattern {
                if normalized.split('/').any(|part| matcher.is_match(part)) {
                    return true;
                }
            }
        }

        for pattern in &self.patterns {
            if let ExcludePattern::Negation { matcher, anchored } = pattern {
                if *anchored {
                    if matcher.is_match(&normalized) {
                        return false;
                    }
                } else if !normalized.contains('/') && matcher.is_match(filename) {
                    return false;
                }
            }
        }

        for pattern in &self.patterns {
            if let ExcludePattern::File { matcher, anchored } = pattern {
                let haystack = if *anchored {
                    normalized.as_str()
                } else {
                    filename
                };
                if matcher.is_match(haystack) {
                    return true;
                }
            }
        }

        false
    }

    /// Full per-rule inclusion decision: the rule's include glob (when
    /// set) must match, test files are dropped when the rule asks for it,
    /// then the exclusion patterns apply.
    pub fn should_include(
        &self,
        path: &Path,
        include: Option<&GlobMatcher>,
        exclude_test_files: bool,
    ) -> bool {
        if let Some(include) = include {
            if !include.is_match(path) {
                return false;
            }
        }
        if exclude_test_files && is_test_file(path) {
            return false;
        }
        !self.is_excluded(path)
    }
}

/// Test-file naming convention: `test_*` prefix or `*_test` stem suffix.
/// Any path component counts, so files under a `test_helpers/` directory
/// are covered too.
pub fn is_test_file(path: &Path) -> bool {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .any(|name| {
            if name.starts_with("test_") {
                return true;
            }
            let stem = name.split('.').next().unwrap_or(name);
            stem.ends_with("_test")
        })
}

/// Compile an include-path glob for a rule.
pub fn compile_include(rule: &str, pattern: &str) -> Result<GlobMatcher, ConfigError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|err| ConfigError::InvalidValue {
            rule: rule.to_string(),
            field: "include_path".to_string(),
            message: err.to_string(),
        })
}

/// Parse an exclusion file: one glob per line, blank lines and `#`
/// comments skipped, surrounding quotes stripped, `!` prefix kept. A
/// missing file yields no patterns.
pub fn read_exclude_patterns(path: &Path) -> Result<Vec<String>, ScanError> {
    let mut contents = String::new();
    match std::fs::File::open(path) {
        Ok(mut file) => {
            file.read_to_string(&mut contents)
                .map_err(|err| ScanError::from_io(path.to_path_buf(), err))?;
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(ScanError::from_io(path.to_path_buf(), err)),
    }

    let mut patterns = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.trim_matches(|c| c == '"' || c == '\'');
        if !line.is_empty() {
            patterns.push(line.to_string());
        }
    }
    Ok(patterns)
}

fn parse_pattern(raw: &str) -> Result<ExcludePattern, ConfigError> {
    let compile = |source: &str| {
        Glob::new(source)
            .map(|g| g.compile_matcher())
            .map_err(|err| ConfigError::InvalidValue {
                rule: "<exclude-patterns>".to_string(),
                field: "pattern".to_string(),
                message: format!("{raw}: {err}"),
            })
    };

    if let Some(negated) = raw.strip_prefix('!') {
        Ok(ExcludePattern::Negation {
            matcher: compile(negated)?,
            anchored: negated.contains('/'),
        })
    } else if let Some(dir) = raw.strip_suffix('/') {
        Ok(ExcludePattern::Directory(compile(dir)?))
    } else {
        Ok(ExcludePattern::File {
            matcher: compile(raw)?,
            anchored: raw.contains('/'),
        })
    }
}

fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy();
    if text.contains('\\') {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    }
}

fn file_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}
