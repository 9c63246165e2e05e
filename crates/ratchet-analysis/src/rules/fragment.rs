//! Second-pass pattern derivation for correlated rules.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::failure::Failure;

/// How a two-pass rule turns a first-pass failure into the pattern
/// searched on the lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondPassFragment {
    /// Extract the class name from a `class Foo:` line and search for
    /// `self.Foo.` usages below it.
    SelfReference,
    /// Turn the failing file's path into import statements for its module
    /// and search for those.
    ModuleImport,
    /// A fixed pattern searched below every first-pass failure.
    Static(String),
}

fn class_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"class\s+(\w+)").unwrap_or_else(|_| unreachable!()))
}

impl SecondPassFragment {
    /// Build the second-pass pattern source for `candidate`, or `None`
    /// when the candidate carries nothing to correlate on.
    pub fn derive(&self, candidate: &Failure) -> Option<String> {
        match self {
            Self::SelfReference => {
                let captures = class_name_regex().captures(&candidate.line)?;
                let name = regex::escape(captures.get(1)?.as_str());
                Some(format!(r"self\.{name}\."))
            }
            Self::ModuleImport => module_import_pattern(&candidate.path),
            Self::Static(source) => Some(source.clone()),
        }
    }
}

/// Pattern matching imports of the module a path corresponds to.
///
/// `pkg/sub/mod.py` yields patterns for `import pkg.sub.mod` and
/// `from pkg.sub import mod`; a top-level `mod.py` yields `import mod`
/// and `from mod import`.
fn module_import_pattern(path: &Path) -> Option<String> {
    let components: Vec<String> = path
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let name = regex::escape(components.last()?);
    let module = regex::escape(&components.join("."));

    if components.len() > 1 {
        let parent = regex::escape(&components[..components.len() - 1].join("."));
        Some(format!(
            r"(?:import\s+{module}\b)|(?:from\s+{parent}\s+import\b[^\n]*\b{name}\b)"
        ))
    } else {
        Some(format!(
            r"(?:import\s+{module}\b)|(?:from\s+{name}\s+import\b)"
        ))
    }
}
