//! ratchet - a ratcheting code-quality gate.
//!
//! Violation counts may only go down: `check` fails when any rule
//! exceeds its stored baseline, `update` moves the baseline to the
//! current counts, `recent` shows the newest failures with optional
//! commit attribution, and `compare` diffs two revisions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ratchet_analysis::rules::builtin::default_rules;
use ratchet_analysis::{BaselineStore, FileSelector, RatchetSuite, SuiteReport};
use ratchet_core::RulesFile;
use ratchet_git::{compare_refs, recently_broken, ComparisonResult, GitAdapter};

#[derive(Parser, Debug)]
#[command(name = "ratchet")]
#[command(version, about = "Ratcheting code-quality gate", long_about = None)]
struct Cli {
    /// Project root to scan
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Rules file (YAML); the builtin catalog is used when it does not exist
    #[arg(long, default_value = "ratchet.yml")]
    rules: PathBuf,

    /// Baseline file, resolved against the project root unless absolute
    #[arg(long, default_value = "ratchet_values.json")]
    baseline: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every rule against the working tree; non-zero exit on regression
    Check {
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Recompute the baseline from the current tree and persist it
    Update,

    /// Show the most recently broken ratchets
    Recent {
        /// Maximum number of failures to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Attribute each failure to the commit that last touched its file
        #[arg(long)]
        commits: bool,
        #[arg(long)]
        json: bool,
    },

    /// Compare rule counts between two revisions
    Compare {
        /// The older revision
        previous: String,
        /// The newer revision
        #[arg(default_value = "HEAD")]
        current: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let root = cli.root.clone();
    let suite = build_suite(&cli, &root)?;
    let baseline_path = resolve(&root, &cli.baseline);

    match cli.command {
        Commands::Check { json } => {
            let baseline = BaselineStore::load(&baseline_path)?;
            let report = suite.run(&root, &baseline);
            print_check(&report, json)?;
            if report.passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Update => {
            let mut baseline = BaselineStore::load(&baseline_path)?;
            let report = suite.update_baseline(&root, &mut baseline);
            baseline
                .save(&baseline_path)
                .context("failed to write baseline")?;
            report_scan_errors(&report);
            for outcome in &report.outcomes {
                println!("{}: {}", outcome.name, outcome.total_count);
            }
            println!("baseline written to {}", baseline_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Recent {
            limit,
            commits,
            json,
        } => {
            let adapter = if commits {
                Some(GitAdapter::open(&root)?)
            } else {
                None
            };
            let broken = recently_broken(&suite, &root, limit, adapter.as_ref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&broken)?);
            } else if broken.is_empty() {
                println!("no broken ratchets");
            } else {
                for item in &broken {
                    match &item.commit {
                        Some(commit) => println!(
                            "{}  ({} @{} {})",
                            item.failure,
                            &commit.hash[..commit.hash.len().min(10)],
                            commit.timestamp,
                            commit.message
                        ),
                        None => println!("{}", item.failure),
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare { previous, current } => {
            let adapter = GitAdapter::open(&root)?;
            let results = compare_refs(&adapter, &suite, &previous, &current)?;
            for result in &results {
                println!("{}", format_comparison(result));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_suite(cli: &Cli, root: &Path) -> Result<RatchetSuite> {
    let selector = FileSelector::for_root(root)?;
    let rules_path = resolve(root, &cli.rules);
    let configs = if rules_path.exists() {
        RulesFile::load(&rules_path)
            .with_context(|| format!("failed to load {}", rules_path.display()))?
            .rules
    } else {
        default_rules()
    };
    Ok(RatchetSuite::new(&configs, selector)?)
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn print_check(report: &SuiteReport, json: bool) -> Result<()> {
    report_scan_errors(report);
    if json {
        println!("{}", serde_json::to_string_pretty(&report.outcomes)?);
        return Ok(());
    }

    let mut regressions = 0usize;
    for outcome in &report.outcomes {
        if outcome.is_regression() {
            regressions += 1;
            println!(
                "{}: {} violations (allowed {}, {} over)",
                outcome.name,
                outcome.total_count,
                outcome.allowed_count,
                outcome.excess()
            );
            for failure in &outcome.failures {
                println!("  {failure}");
            }
        }
    }
    if regressions == 0 {
        println!("all {} ratchets hold", report.outcomes.len());
    } else {
        println!(
            "{regressions} of {} ratchets exceeded their baseline",
            report.outcomes.len()
        );
    }
    Ok(())
}

fn report_scan_errors(report: &SuiteReport) {
    for err in &report.errors {
        eprintln!("warning: {err}");
    }
}

fn format_comparison(result: &ComparisonResult) -> String {
    let percent = if result.percentage_change.is_infinite() {
        "+inf%".to_string()
    } else {
        format!("{:+.1}%", result.percentage_change)
    };
    let marker = if result.is_worse { "worse" } else { "ok" };
    format!(
        "{}: {} -> {} ({:+}, {percent}) [{marker}]",
        result.test_name, result.previous_count, result.current_count, result.difference
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn comparison_formatting() {
        let worse = ComparisonResult {
            test_name: "no-print".to_string(),
            current_count: 5,
            previous_count: 0,
            difference: 5,
            percentage_change: f64::INFINITY,
            is_worse: true,
        };
        assert_eq!(
            format_comparison(&worse),
            "no-print: 0 -> 5 (+5, +inf%) [worse]"
        );

        let better = ComparisonResult {
            test_name: "no-pdb".to_string(),
            current_count: 1,
            previous_count: 2,
            difference: -1,
            percentage_change: -50.0,
            is_worse: false,
        };
        assert_eq!(
            format_comparison(&better),
            "no-pdb: 2 -> 1 (-1, -50.0%) [ok]"
        );
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        assert_eq!(
            resolve(Path::new("/repo"), Path::new("ratchet_values.json")),
            PathBuf::from("/repo/ratchet_values.json")
        );
        assert_eq!(
            resolve(Path::new("/repo"), Path::new("/etc/baseline.json")),
            PathBuf::from("/etc/baseline.json")
        );
    }
}
