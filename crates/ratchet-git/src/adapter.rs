//! Subprocess wrapper around the `git` binary.
//!
//! Every invocation goes through one argument filter that rejects shell
//! metacharacters unless the argument is a recognized format specifier
//! flag. That allow-list is the injection-prevention boundary; nothing
//! here ever passes through a shell.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::Serialize;
use tracing::{debug, error};

use ratchet_core::GitError;

/// Characters rejected in arguments unless the argument is a
/// `--format=`/`--pretty=` specifier.
const UNSAFE_CHARS: &[char] = &[';', '|', '&', '>', '<', '`', '$', '{', '}', '[', ']'];

/// Commit metadata: hash, unix timestamp (seconds), subject line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    pub timestamp: i64,
    pub message: String,
}

/// One line of blame output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameLine {
    pub hash: String,
    pub author: String,
    pub line_number: usize,
    pub content: String,
}

/// Per-submodule fields stored in `.gitmodules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleField {
    Url,
    Path,
    Branch,
    Ignore,
    Update,
    Shallow,
    Recursive,
    FetchRecurseSubmodules,
}

impl SubmoduleField {
    pub fn key(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Path => "path",
            Self::Branch => "branch",
            Self::Ignore => "ignore",
            Self::Update => "update",
            Self::Shallow => "shallow",
            Self::Recursive => "recursive",
            Self::FetchRecurseSubmodules => "fetchRecurseSubmodules",
        }
    }
}

/// Wraps git subcommands for one repository.
#[derive(Debug, Clone)]
pub struct GitAdapter {
    repo_path: PathBuf,
}

impl GitAdapter {
    /// Bind to the repository containing `path`, verifying it is one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let adapter = Self {
            repo_path: path.into(),
        };
        let output = adapter.run_unchecked(&["rev-parse", "--is-inside-work-tree"])?;
        if !output.status.success() || stdout_trimmed(&output) != "true" {
            return Err(GitError::NotARepository {
                path: adapter.repo_path,
            });
        }
        Ok(adapter)
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn validate_args(args: &[&str]) -> Result<(), GitError> {
        for arg in args {
            if arg.starts_with("--format=") || arg.starts_with("--pretty=") {
                continue;
            }
            if arg.contains(UNSAFE_CHARS) {
                return Err(GitError::UnsafeArgument {
                    argument: (*arg).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run a git subcommand without checking the exit status.
    fn run_unchecked(&self, args: &[&str]) -> Result<Output, GitError> {
        Self::validate_args(args)?;
        debug!(args = ?args, "git");
        Ok(Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()?)
    }

    /// Run a git subcommand, classifying a non-zero exit by its stderr.
    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run_unchecked(args)?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let lowered = stderr.to_lowercase();
        if lowered.contains("not a git repository") {
            return Err(GitError::NotARepository {
                path: self.repo_path.clone(),
            });
        }
        if lowered.contains("bad revision") || lowered.contains("unknown revision") {
            return Err(GitError::InvalidRevision {
                revision: args.join(" "),
            });
        }
        if lowered.contains("detached head") {
            return Err(GitError::DetachedHead);
        }
        Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr,
        })
    }

    fn output_lines(&self, args: &[&str]) -> Result<Vec<String>, GitError> {
        let output = self.run(args)?;
        Ok(stdout_trimmed(&output)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn output_paths(&self, args: &[&str]) -> Result<Vec<PathBuf>, GitError> {
        Ok(self
            .output_lines(args)?
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    pub fn is_detached_head(&self) -> Result<bool, GitError> {
        let output = self.run_unchecked(&["symbolic-ref", "-q", "HEAD"])?;
        Ok(!output.status.success())
    }

    /// Current branch name. Refuses in detached-HEAD state rather than
    /// reporting the literal string `HEAD`.
    pub fn current_branch(&self) -> Result<String, GitError> {
        if self.is_detached_head()? {
            return Err(GitError::DetachedHead);
        }
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(stdout_trimmed(&output).to_string())
    }

    /// Paths changed relative to `base` (via the merge base) or to HEAD.
    /// Refuses in detached-HEAD state or while conflicts are unresolved:
    /// an empty answer there would be misleading.
    pub fn changed_files(&self, base: Option<&str>) -> Result<Vec<PathBuf>, GitError> {
        if self.is_detached_head()? {
            return Err(GitError::DetachedHead);
        }
        if self.has_merge_conflicts()? {
            return Err(GitError::MergeConflicts);
        }
        match base {
            Some(base) => {
                let merge_base = self.merge_base(base, "HEAD")?;
                self.output_paths(&["diff", "--name-only", &merge_base])
            }
            None => self.output_paths(&["diff", "--name-only", "HEAD"]),
        }
    }

    pub fn merge_base(&self, first: &str, second: &str) -> Result<String, GitError> {
        let output = self.run(&["merge-base", first, second])?;
        Ok(stdout_trimmed(&output).to_string())
    }

    /// Full commit history, newest first.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<CommitRecord>, GitError> {
        if self.is_detached_head()? {
            return Err(GitError::DetachedHead);
        }
        let limit_arg;
        let mut args = vec!["log", "--format=%H %ct %s"];
        if let Some(limit) = limit {
            limit_arg = format!("-n{limit}");
            args.push(&limit_arg);
        }
        let lines = self.output_lines(&args)?;
        lines
            .iter()
            .map(|line| parse_commit_line(line, "log"))
            .collect()
    }

    /// Commits that touched `path`, newest first, following renames.
    pub fn file_history(&self, path: &Path) -> Result<Vec<CommitRecord>, GitError> {
        let relative = self.relative(path)?;
        let lines = self.output_lines(&[
            "log",
            "--format=%H %ct %s",
            "--follow",
            "--",
            &relative,
        ])?;
        lines
            .iter()
            .map(|line| parse_commit_line(line, "log"))
            .collect()
    }

    /// Most recent commit touching `path`, or `None` for a file with no
    /// history (untracked or never committed).
    pub fn last_commit_for(&self, path: &Path) -> Result<Option<CommitRecord>, GitError> {
        let relative = self.relative(path)?;
        let lines = self.output_lines(&["log", "-1", "--format=%H %ct %s", "--", &relative])?;
        match lines.first() {
            Some(line) => Ok(Some(parse_commit_line(line, "log")?)),
            None => Ok(None),
        }
    }

    /// Metadata for one commit. Refuses while conflicts are unresolved.
    pub fn commit_info(&self, revision: &str) -> Result<CommitRecord, GitError> {
        if self.has_merge_conflicts()? {
            return Err(GitError::MergeConflicts);
        }
        let output = self.run_unchecked(&["show", "-s", "--format=%H %ct %s", revision])?;
        if !output.status.success() {
            return Err(GitError::InvalidRevision {
                revision: revision.to_string(),
            });
        }
        parse_commit_line(stdout_trimmed(&output), "show")
    }

    /// Contents of `path` as of `revision`.
    pub fn file_at(&self, path: &Path, revision: &str) -> Result<String, GitError> {
        let relative = self.relative(path)?;
        let spec = format!("{revision}:{relative}");
        let output = self.run(&["show", &spec])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn has_merge_conflicts(&self) -> Result<bool, GitError> {
        Ok(!self.merge_conflicts()?.is_empty())
    }

    /// Paths with unresolved conflicts.
    pub fn merge_conflicts(&self) -> Result<Vec<PathBuf>, GitError> {
        self.output_paths(&["diff", "--name-only", "--diff-filter=U"])
    }

    /// Blame one line: the commit that introduced it, or `None` when the
    /// file has no blame information.
    pub fn blame_line(&self, path: &Path, line: usize) -> Result<Option<String>, GitError> {
        let relative = self.relative(path)?;
        let range = format!("{line},{line}");
        let output = self.run_unchecked(&["blame", "-L", &range, "--porcelain", &relative])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(stdout_trimmed(&output)
            .split_whitespace()
            .next()
            .map(str::to_string))
    }

    /// Full-file blame via line-porcelain output, sorted by line number.
    pub fn blame_file(&self, path: &Path) -> Result<Vec<BlameLine>, GitError> {
        let relative = self.relative(path)?;
        let output = self.run(&["blame", "--line-porcelain", &relative])?;
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(parse_line_porcelain(&text))
    }

    /// Stashes as (hash, message) pairs, the `On <branch>:` prefix
    /// stripped from the message.
    pub fn stash_list(&self) -> Result<Vec<(String, String)>, GitError> {
        let lines = self.output_lines(&["stash", "list", "--format=%H %s"])?;
        Ok(lines
            .iter()
            .filter_map(|line| {
                let (hash, message) = line.split_once(' ')?;
                let message = match message.strip_prefix("On ") {
                    Some(rest) => rest.split_once(": ").map_or(message, |(_, m)| m),
                    None => message,
                };
                Some((hash.to_string(), message.to_string()))
            })
            .collect())
    }

    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let output = self.run_unchecked(&["config", "--get", key])?;
        if output.status.success() {
            Ok(Some(stdout_trimmed(&output).to_string()))
        } else {
            Ok(None)
        }
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run(&["config", key, value]).map(drop)
    }

    pub fn repo_root(&self) -> Result<PathBuf, GitError> {
        let output = self.run(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(stdout_trimmed(&output)))
    }

    pub fn tags(&self) -> Result<Vec<String>, GitError> {
        self.output_lines(&["tag", "--list"])
    }

    /// Read a field of a submodule from `.gitmodules`.
    pub fn submodule_field(
        &self,
        name: &str,
        field: SubmoduleField,
    ) -> Result<Option<String>, GitError> {
        let key = format!("submodule.{name}.{}", field.key());
        let output = self.run_unchecked(&["config", "-f", ".gitmodules", "--get", &key])?;
        if output.status.success() {
            Ok(Some(stdout_trimmed(&output).to_string()))
        } else {
            Ok(None)
        }
    }

    /// Write a field of a submodule to `.gitmodules` and sync.
    pub fn set_submodule_field(
        &self,
        name: &str,
        field: SubmoduleField,
        value: &str,
    ) -> Result<(), GitError> {
        let key = format!("submodule.{name}.{}", field.key());
        self.run(&["config", "-f", ".gitmodules", &key, value])?;
        self.sync_submodules()
    }

    /// Commit and path reported by `git submodule status` for one
    /// submodule. The state prefix (`-`, `+`, `U`) is stripped.
    pub fn submodule_status(&self, path: &str) -> Result<(String, String), GitError> {
        let output = self.run(&["submodule", "status", path])?;
        let line = stdout_trimmed(&output);
        let trimmed = line.trim_start_matches(['-', '+', 'U', ' ']);
        let mut parts = trimmed.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(hash), Some(sub_path)) => Ok((hash.to_string(), sub_path.to_string())),
            _ => Err(GitError::InvalidOutput {
                command: "submodule status".to_string(),
                message: format!("unexpected output {line:?}"),
            }),
        }
    }

    pub fn init_submodules(&self) -> Result<(), GitError> {
        self.run(&["submodule", "init"]).map(drop)
    }

    pub fn update_submodules(&self) -> Result<(), GitError> {
        self.run(&["submodule", "update", "--init", "--recursive"])
            .map(drop)
    }

    pub fn sync_submodules(&self) -> Result<(), GitError> {
        self.run(&["submodule", "sync"]).map(drop)
    }

    /// Run a command in every submodule. The command is subject to the
    /// same argument filter as everything else.
    pub fn foreach_submodule(&self, command: &str) -> Result<String, GitError> {
        let output = self.run(&["submodule", "foreach", "--quiet", command])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Branch name when on a branch, commit hash when detached. This is
    /// the state a scoped checkout restores to; `checkout -` would not
    /// do, since `@{-1}` is only updated by branch-switching checkouts
    /// and does not exist in a repo with no checkout history.
    fn current_state(&self) -> Result<String, GitError> {
        let output = self.run_unchecked(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if output.status.success() {
            return Ok(stdout_trimmed(&output).to_string());
        }
        let output = self.run(&["rev-parse", "HEAD"])?;
        Ok(stdout_trimmed(&output).to_string())
    }

    /// Stash any local changes, check out `revision`, and return a guard
    /// that restores the starting branch (or commit, when detached) and
    /// unstashes when dropped.
    pub fn checkout_scoped(&self, revision: &str) -> Result<CheckoutGuard<'_>, GitError> {
        let start = self.current_state()?;
        let stash = self.run_unchecked(&["stash", "push", "-m", "ratchet_temp_stash"])?;
        let stashed = stash.status.success()
            && !stdout_trimmed(&stash).starts_with("No local changes");

        if let Err(err) = self.run(&["checkout", revision]) {
            if stashed {
                // Put the working tree back before reporting the failure.
                if let Err(pop_err) = self.run(&["stash", "pop"]) {
                    error!(error = %pop_err, "failed to unstash after aborted checkout");
                }
            }
            return Err(err);
        }

        Ok(CheckoutGuard {
            adapter: self,
            start,
            stashed,
            restored: false,
        })
    }

    fn relative(&self, path: &Path) -> Result<String, GitError> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.repo_path)
                .map_err(|_| GitError::OutsideRepository {
                    path: path.to_path_buf(),
                })?
        } else {
            path
        };
        Ok(relative.to_string_lossy().into_owned())
    }
}

/// Restores the pre-checkout state on all exit paths.
///
/// Prefer calling [`CheckoutGuard::restore`] to observe errors; the drop
/// impl restores best-effort and only logs.
#[must_use]
pub struct CheckoutGuard<'a> {
    adapter: &'a GitAdapter,
    start: String,
    stashed: bool,
    restored: bool,
}

impl CheckoutGuard<'_> {
    /// Switch back to the starting branch and pop the stash.
    pub fn restore(mut self) -> Result<(), GitError> {
        self.restored = true;
        self.restore_inner()
    }

    fn restore_inner(&self) -> Result<(), GitError> {
        self.adapter.run(&["checkout", self.start.as_str()])?;
        if self.stashed && !self.adapter.stash_list()?.is_empty() {
            self.adapter.run(&["stash", "pop"])?;
        }
        Ok(())
    }
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        if !self.restored {
            self.restored = true;
            if let Err(err) = self.restore_inner() {
                error!(error = %err, "failed to restore checkout state");
            }
        }
    }
}

fn stdout_trimmed(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).unwrap_or("").trim()
}

/// Parse one `%H %ct %s` line.
fn parse_commit_line(line: &str, command: &str) -> Result<CommitRecord, GitError> {
    let mut parts = line.trim().splitn(3, ' ');
    let (hash, timestamp) = match (parts.next(), parts.next()) {
        (Some(hash), Some(timestamp)) if !hash.is_empty() => (hash, timestamp),
        _ => {
            return Err(GitError::InvalidOutput {
                command: command.to_string(),
                message: format!("expected `hash timestamp subject`, got {line:?}"),
            })
        }
    };
    let timestamp = timestamp
        .parse::<i64>()
        .map_err(|_| GitError::InvalidOutput {
            command: command.to_string(),
            message: format!("bad timestamp in {line:?}"),
        })?;
    Ok(CommitRecord {
        hash: hash.to_string(),
        timestamp,
        message: parts.next().unwrap_or("").to_string(),
    })
}

/// Parse `blame --line-porcelain` output.
fn parse_line_porcelain(text: &str) -> Vec<BlameLine> {
    let mut result = Vec::new();
    let mut hash = String::new();
    let mut line_number = 0usize;
    let mut author = String::new();

    for line in text.lines() {
        if let Some(content) = line.strip_prefix('\t') {
            if !hash.is_empty() {
                result.push(BlameLine {
                    hash: hash.clone(),
                    author: author.clone(),
                    line_number,
                    content: content.to_string(),
                });
            }
        } else if let Some(rest) = line.strip_prefix("author ") {
            author = rest.to_string();
        } else {
            // Header lines start with `<hash> <orig-line> <final-line>`.
            let mut parts = line.split_whitespace();
            if let (Some(first), Some(_), Some(final_line)) =
                (parts.next(), parts.next(), parts.next())
            {
                if first.len() == 40 && first.chars().all(|c| c.is_ascii_hexdigit()) {
                    if let Ok(number) = final_line.parse() {
                        hash = first.to_string();
                        line_number = number;
                    }
                }
            }
        }
    }

    result.sort_by_key(|b| b.line_number);
    result
}
