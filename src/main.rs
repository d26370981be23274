//! regsweep CLI
//!
//! Entry point for the `regsweep` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use regsweep::cache;
use regsweep::config::RunConfig;
use regsweep::signal::{self, CancelFlag, EXIT_CODE_CANCELLED};
use regsweep::{Mode, PolicyTable, SweepOptions, SweepRunner};
use regsweep_registry::MockRegistry;

/// Exit codes: 0 success, 2 configuration or policy rejected, 3 registry
/// unavailable, 4 report persistence failed, 80 cancelled.
const EXIT_CODE_CONFIG: i32 = 2;
const EXIT_CODE_REGISTRY: i32 = 3;
const EXIT_CODE_REPORT: i32 = 4;

#[derive(Parser)]
#[command(name = "regsweep")]
#[command(about = "Policy-driven retention sweeper for container registries", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep all repositories under the retention policy
    Run {
        /// Actually delete; the default is a dry-run
        #[arg(long)]
        execute: bool,

        /// Deletion worker count
        #[arg(long)]
        concurrency: Option<usize>,

        /// Restrict the sweep to repositories matching a glob (repeatable)
        #[arg(long = "repo")]
        repos: Vec<String>,

        /// Path to a retention policy file (default: built-in table)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Directory for run reports
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Path to a config file (default: none)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Registry fixture file (JSON snapshot of repositories and images)
        #[arg(long)]
        fixture: PathBuf,

        /// Print the full report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Per-repository progress on stderr
        #[arg(short = 'v', long)]
        verbose: bool,
    },

    /// Inspect or validate the retention policy table
    Policy {
        #[command(subcommand)]
        action: PolicyCommands,
    },

    /// Explain a repository's tier classification without sweeping
    Explain {
        /// The repository name to classify
        repository: String,

        /// Human-readable output instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// Prune unreferenced blobs from a local image cache
    PruneCache {
        /// Cache root directory (holds blobs/ and refs.json)
        #[arg(long)]
        cache_root: PathBuf,

        /// Actually remove; the default is a dry-run
        #[arg(long)]
        execute: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Print the effective policy table
    Show {
        /// Path to a retention policy file (default: built-in table)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate a retention policy file
    Check {
        /// Path to the retention policy file
        policy: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            execute,
            concurrency,
            repos,
            policy,
            report_dir,
            config,
            fixture,
            json,
            verbose,
        } => {
            run_sweep(
                execute, concurrency, repos, policy, report_dir, config, fixture, json, verbose,
            );
        }
        Commands::Policy { action } => match action {
            PolicyCommands::Show { policy, json } => run_policy_show(policy, json),
            PolicyCommands::Check { policy } => run_policy_check(&policy),
        },
        Commands::Explain { repository, human } => run_explain(&repository, human),
        Commands::PruneCache {
            cache_root,
            execute,
            json,
        } => run_prune_cache(&cache_root, execute, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_sweep(
    execute: bool,
    concurrency: Option<usize>,
    repos: Vec<String>,
    policy_path: Option<PathBuf>,
    report_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    fixture: PathBuf,
    json: bool,
    verbose: bool,
) {
    // Layered config; CLI flags win over env and file
    let mut config = match RunConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(EXIT_CODE_CONFIG);
        }
    };
    if execute {
        config.execute = true;
    }
    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency;
    }
    if !repos.is_empty() {
        config.repo_globs = repos;
    }
    if let Some(path) = policy_path {
        config.policy_path = Some(path);
    }
    if let Some(dir) = report_dir {
        config.report_dir = dir;
    }
    if verbose {
        config.verbose = true;
    }

    let policy = match &config.policy_path {
        Some(path) => match PolicyTable::from_file(path) {
            Ok(policy) => policy,
            Err(e) => {
                eprintln!("Policy error: {e}");
                process::exit(EXIT_CODE_CONFIG);
            }
        },
        None => PolicyTable::builtin(),
    };

    let repo_filter = match config.repo_filter() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(EXIT_CODE_CONFIG);
        }
    };

    let registry = match MockRegistry::from_fixture_file(&fixture) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Fixture error: {e}");
            process::exit(EXIT_CODE_CONFIG);
        }
    };

    let cancel = Arc::new(CancelFlag::new());
    if let Err(e) = signal::install(Arc::clone(&cancel)) {
        eprintln!("Warning: could not install signal handler: {e}");
    }

    let options = SweepOptions {
        mode: if config.execute {
            Mode::Execute
        } else {
            Mode::DryRun
        },
        concurrency: config.concurrency,
        verbose: config.verbose,
        repo_filter,
    };

    let runner = SweepRunner::new(&registry, &policy, options).with_cancel_flag(Arc::clone(&cancel));
    let report = match runner.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_CODE_REGISTRY);
        }
    };

    let path = match report.write_to_dir(&config.report_dir) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error writing run report: {e}");
            process::exit(EXIT_CODE_REPORT);
        }
    };

    if json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                process::exit(EXIT_CODE_REPORT);
            }
        }
    } else {
        println!("{}", report.human_summary);
        println!("Report written to: {}", path.display());
    }

    if report.cancelled {
        process::exit(EXIT_CODE_CANCELLED);
    }
}

fn run_policy_show(policy_path: Option<PathBuf>, json: bool) {
    let policy = match policy_path {
        Some(path) => match PolicyTable::from_file(&path) {
            Ok(policy) => policy,
            Err(e) => {
                eprintln!("Policy error: {e}");
                process::exit(EXIT_CODE_CONFIG);
            }
        },
        None => PolicyTable::builtin(),
    };

    if json {
        match policy.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing policy: {e}");
                process::exit(1);
            }
        }
        return;
    }

    println!("Effective retention policy:\n");
    for (tier, rules) in [
        ("dev", &policy.dev),
        ("staging", &policy.staging),
        ("production", &policy.production),
    ] {
        let cap = match rules.tagged_keep_count {
            Some(cap) => cap.to_string(),
            None => "unlimited".to_string(),
        };
        println!(
            "  {tier:<11} untagged max age: {:>3} days, tagged keep count: {cap}",
            rules.untagged_max_age_days
        );
    }
    match policy.sha256() {
        Ok(hash) => println!("\n  snapshot sha256: {hash}"),
        Err(e) => eprintln!("Warning: could not hash policy: {e}"),
    }
}

fn run_policy_check(path: &PathBuf) {
    match PolicyTable::from_file(path) {
        Ok(_) => {
            println!("Policy valid: {}", path.display());
        }
        Err(e) => {
            eprintln!("Policy error: {e}");
            process::exit(EXIT_CODE_CONFIG);
        }
    }
}

fn run_explain(repository: &str, human: bool) {
    let explanation = regsweep::classifier::explain(repository);

    if human {
        println!("{}", explanation.to_human());
    } else {
        match explanation.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing output: {e}");
                process::exit(1);
            }
        }
    }
}

fn run_prune_cache(cache_root: &PathBuf, execute: bool, json: bool) {
    let outcome = match cache::prune(cache_root, !execute) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Cache prune error: {e}");
            process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing outcome: {e}");
                process::exit(1);
            }
        }
    } else {
        let mode = if execute { "removed" } else { "would remove" };
        println!(
            "Scanned {} blob(s), {mode} {} ({} bytes)",
            outcome.scanned, outcome.removed, outcome.bytes_reclaimed
        );
        for error in &outcome.errors {
            eprintln!("  warning: {error}");
        }
    }
}
