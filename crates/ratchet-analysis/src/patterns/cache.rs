//! Shared regex compilation with generation-based invalidation.
//!
//! Rule evaluation compiles the same pattern sources over and over while
//! scanning a tree, so compiled regexes are memoized behind a mutex. The
//! cache key includes a generation counter; bumping the generation makes
//! every previously cached entry unreachable without touching callers that
//! still hold a [`Pattern`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use regex::Regex;
use rustc_hash::FxHashMap;

use ratchet_core::MatchFlags;

/// A regex that never matches any input, including the empty string.
///
/// `\b\B` requires a position that is both a word boundary and not one,
/// which is unsatisfiable.
pub const NEVER_MATCH: &str = r"\b\B";

/// A compiled pattern together with the source text it was built from.
///
/// Cloning is cheap; the compiled regex is shared.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: Arc<str>,
    regex: Arc<Regex>,
}

impl Pattern {
    fn new(source: &str, regex: Regex) -> Self {
        Self {
            source: Arc::from(source),
            regex: Arc::new(regex),
        }
    }

    /// The textual source this pattern was compiled from, after any
    /// escaping or flag prefixing.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Number of non-overlapping matches in `haystack`.
    pub fn count_matches(&self, haystack: &str) -> usize {
        self.regex.find_iter(haystack).count()
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

type CacheKey = (String, bool, u64);

/// Memoizes compiled regexes keyed by source text, escape flag, and the
/// current generation.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: Mutex<FxHashMap<CacheKey, Pattern>>,
    generation: AtomicU64,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source`, reusing a cached entry from the current
    /// generation when one exists. With `escape` set the source is treated
    /// as literal text rather than regex syntax.
    pub fn compile(&self, source: &str, escape: bool) -> Result<Pattern, regex::Error> {
        let generation = self.generation.load(Ordering::Acquire);
        let key = (source.to_owned(), escape, generation);

        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(pattern) = entries.get(&key) {
            return Ok(pattern.clone());
        }

        let effective = if escape {
            regex::escape(source)
        } else {
            source.to_owned()
        };
        let regex = Regex::new(&effective)?;
        let pattern = Pattern::new(&effective, regex);
        entries.insert(key, pattern.clone());
        Ok(pattern)
    }

    /// Compile with inline flags prefixed onto the source. Used by the
    /// whole-file strategy, which supports case-insensitive, multi-line,
    /// and dot-matches-newline matching.
    pub fn compile_with_flags(
        &self,
        source: &str,
        flags: MatchFlags,
    ) -> Result<Pattern, regex::Error> {
        let mut prefix = String::new();
        if flags.case_insensitive {
            prefix.push('i');
        }
        if flags.multi_line {
            prefix.push('m');
        }
        if flags.dot_all {
            prefix.push('s');
        }
        if prefix.is_empty() {
            self.compile(source, false)
        } else {
            self.compile(&format!("(?{prefix}){source}"), false)
        }
    }

    /// Join several pattern sources into one alternation.
    ///
    /// An empty slice yields a pattern that matches nothing. A single
    /// source is wrapped in a non-capturing group; multiple sources are
    /// each wrapped and joined with `|`.
    pub fn join<S: AsRef<str>>(
        &self,
        sources: &[S],
        escape: bool,
    ) -> Result<Pattern, regex::Error> {
        if sources.is_empty() {
            return self.compile(NEVER_MATCH, false);
        }
        let joined = sources
            .iter()
            .map(|s| {
                let s = s.as_ref();
                if escape {
                    format!("(?:{})", regex::escape(s))
                } else {
                    format!("(?:{s})")
                }
            })
            .collect::<Vec<_>>()
            .join("|");
        self.compile(&joined, false)
    }

    /// Bump the generation, making all cached entries unreachable. Entries
    /// from older generations stay in the map until the cache is dropped;
    /// patterns already handed out keep working.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
