//! Mission Runner CLI
//!
//! Runs learner submissions against mission tests from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mission_runner::runtime::inspect;
use mission_runner::sandbox::OutputEntry;
use mission_runner::service::{Catalog, MemoryStore, MissionService, SubmitRequest};
use mission_runner::strip::TypeStripper;
use mission_runner::{RunnerConfig, Sandbox, TestRunReport, VERSION};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mission-runner")]
#[command(author, version, about = "Run TypeScript mission submissions against their tests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Wall-clock limit per run in milliseconds (0 disables it)
    #[arg(long, value_name = "MS", global = true)]
    timeout_ms: Option<u64>,

    /// Interpreter step budget per run
    #[arg(long, value_name = "N", global = true)]
    max_operations: Option<u64>,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a learner file against a test file
    Run {
        /// Learner submission
        #[arg(long, value_name = "FILE")]
        code: PathBuf,
        /// Test script
        #[arg(long, value_name = "FILE")]
        tests: PathBuf,
        /// Print the JSON report instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// Print a file with its type annotations removed
    Strip {
        /// The file to strip
        file: PathBuf,
        /// Also remove import statements, as for test scripts
        #[arg(long)]
        test_code: bool,
    },

    /// Evaluate a snippet in a fresh sandbox
    Eval {
        /// The code to evaluate
        code: String,
    },

    /// Submit a file to a catalog mission and print the response
    Check {
        /// Catalog of courses, lessons and missions
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,
        /// Mission id
        #[arg(long)]
        mission: String,
        /// Learner submission
        #[arg(long, value_name = "FILE")]
        code: PathBuf,
        /// Submitting user
        #[arg(long, default_value = "local")]
        user: String,
    },

    /// Run every catalog mission's reference solution against its tests
    Verify {
        /// Catalog of courses, lessons and missions
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins; otherwise each `-v` raises the level from `warn`.
fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(timeout_ms) = cli.timeout_ms {
        config.sandbox.timeout_ms = timeout_ms;
    }
    if let Some(max_operations) = cli.max_operations {
        config.sandbox.max_operations = max_operations;
    }
    config.validate()?;
    Ok(config)
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Error reading '{}'", path.display()))
}

/// Returns whether the command succeeded.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Run { code, tests, json } => run_files(&config, code, tests, *json),
        Commands::Strip { file, test_code } => strip_file(&config, file, *test_code),
        Commands::Eval { code } => eval_code(&config, code),
        Commands::Check {
            catalog,
            mission,
            code,
            user,
        } => check_mission(&config, catalog, mission, code, user),
        Commands::Verify { catalog } => verify_catalog(&config, catalog),
    }
}

fn run_files(config: &RunnerConfig, code: &Path, tests: &Path, json: bool) -> anyhow::Result<bool> {
    let learner = read_source(code)?;
    let tests = read_source(tests)?;
    let report = config.orchestrator().run(&learner, &tests);
    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print_report(&report);
    }
    Ok(report.passed)
}

fn print_report(report: &TestRunReport) {
    for entry in &report.console {
        println!("[{}] {}", entry.level, entry.message);
    }
    print!("{}", report);
}

fn strip_file(config: &RunnerConfig, file: &Path, test_code: bool) -> anyhow::Result<bool> {
    let source = read_source(file)?;
    let rules = if test_code {
        config.strip.test_rules()
    } else {
        config.strip.learner_rules()
    };
    let stripped = TypeStripper::new(rules)
        .strip(&source)
        .with_context(|| format!("Cannot strip '{}'", file.display()))?;
    print!("{}", stripped);
    Ok(true)
}

fn eval_code(config: &RunnerConfig, code: &str) -> anyhow::Result<bool> {
    let source = TypeStripper::new(config.strip.learner_rules()).strip(code)?;
    let sandbox_config = config.sandbox.clone();
    let (console, result) = thread::Builder::new()
        .name("mission-eval".into())
        .stack_size(sandbox_config.stack_size)
        .spawn(move || {
            let mut sandbox = Sandbox::new(sandbox_config);
            let result = sandbox.eval("eval", &source).map(|value| inspect::inspect(&value));
            (sandbox.take_console_output(), result)
        })
        .context("Cannot start evaluation thread")?
        .join()
        .map_err(|_| anyhow::anyhow!("Evaluation thread panicked"))?;

    print_console(&console);
    match result {
        Ok(value) => {
            println!("{}", value);
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(false)
        }
    }
}

fn print_console(entries: &[OutputEntry]) {
    for entry in entries {
        println!("{}", entry.message);
    }
}

fn load_service(config: &RunnerConfig, catalog: &Path) -> anyhow::Result<MissionService<MemoryStore>> {
    let catalog = Catalog::load(catalog)?;
    let store = Arc::new(MemoryStore::from_catalog(catalog));
    Ok(MissionService::new(store, config.orchestrator()))
}

fn check_mission(
    config: &RunnerConfig,
    catalog: &Path,
    mission: &str,
    code: &Path,
    user: &str,
) -> anyhow::Result<bool> {
    let service = load_service(config, catalog)?;
    let request = SubmitRequest::new(read_source(code)?);
    let response = service.submit_tests(Some(user), mission, &request);
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        bail!("request failed with status {}", response.status);
    }
    Ok(response.body["testResults"]["passed"] == serde_json::Value::Bool(true))
}

fn verify_catalog(config: &RunnerConfig, catalog: &Path) -> anyhow::Result<bool> {
    let service = load_service(config, catalog)?;
    let orchestrator = config.orchestrator();
    let missions = service.store().missions();

    println!("mission-runner {}: verifying {} missions", VERSION, missions.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let mut failed = 0;
    let mut skipped = 0;
    for mission in &missions {
        let Some(solution) = &mission.solution_code else {
            println!("  - {} (no solution)", mission.id);
            skipped += 1;
            continue;
        };
        let report = orchestrator.run(solution, &mission.test_code);
        if report.passed {
            println!("  ✓ {} ({}/{})", mission.id, report.passed_tests, report.total_tests);
        } else {
            failed += 1;
            println!("  ✗ {} ({}/{})", mission.id, report.passed_tests, report.total_tests);
            if let Some(error) = &report.error {
                println!("      {}", error);
            }
            for result in report.results.iter().filter(|r| !r.passed) {
                println!("      {}: {}", result.name, result.error.as_deref().unwrap_or(""));
            }
        }
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "  {} passed, {} failed, {} skipped",
        missions.len() - failed - skipped,
        failed,
        skipped
    );
    Ok(failed == 0)
}
