//! sapauto CLI
//!
//! Logs on to every SAP system listed in a workbook, runs the configured
//! task and logs off again.
//!
//! Usage:
//!   sapauto run                       # process data/logon_sap.xlsx
//!   sapauto run --dry-run             # same flow against a simulated SAP GUI
//!   sapauto run --report report.json  # also write a JSON report
//!   sapauto check                     # show which rows have a password

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sapauto::platforms::simulated::SimulatedEngine;
use sapauto::platforms::{create_engine, ScriptingEngine};
use sapauto::workbook::{into_work_items, read_work_items};
use sapauto::{BatchRunner, CredentialStore, PasswordResolver, Timings, WorkItem};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

mod logging;

#[derive(Parser, Debug)]
#[command(name = "sapauto", version)]
#[command(about = "Batch logon automation for SAP GUI")]
struct Cli {
    /// Directory for sap_automation.log (overwritten on each run)
    #[arg(long, global = true, env = "SAPAUTO_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log on to every listed system, run the task and log off
    Run(RunArgs),
    /// Load the inputs and report which rows have a password, without touching SAP GUI
    Check(InputArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Workbook listing system, client and user on every sheet
    #[arg(long, env = "SAPAUTO_WORKBOOK", default_value = "data/logon_sap.xlsx")]
    workbook: PathBuf,

    /// JSON credentials shaped {system: {user: {client: password}}}
    #[arg(long, env = "SAPAUTO_CREDENTIALS", default_value = "config/credentials.json")]
    credentials: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Drive a simulated SAP GUI instead of the real one
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON report of every item to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Exit with status 2 when any item failed
    #[arg(long)]
    fail_on_error: bool,

    #[command(flatten)]
    timings: TimingArgs,
}

/// Overrides for the default settle times, in milliseconds
#[derive(Args, Debug, Default)]
struct TimingArgs {
    /// How long to wait for a new connection's first session
    #[arg(long, env = "SAPAUTO_CONNECT_TIMEOUT_MS")]
    connect_timeout: Option<u64>,

    /// Delay between session checks while waiting
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Pause after submitting the logon form
    #[arg(long)]
    logon_settle: Option<u64>,

    /// Pause after sending the logoff command
    #[arg(long)]
    logoff_settle: Option<u64>,

    /// Duration of the placeholder task
    #[arg(long)]
    task_duration: Option<u64>,
}

impl TimingArgs {
    fn apply(&self, mut timings: Timings) -> Timings {
        let ms = Duration::from_millis;
        if let Some(v) = self.connect_timeout {
            timings.connect_timeout = ms(v);
        }
        if let Some(v) = self.poll_interval {
            timings.poll_interval = ms(v);
        }
        if let Some(v) = self.logon_settle {
            timings.logon_settle = ms(v);
        }
        if let Some(v) = self.logoff_settle {
            timings.logoff_settle = ms(v);
        }
        if let Some(v) = self.task_duration {
            timings.task_duration = ms(v);
        }
        timings
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = match logging::init_logging(&cli.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Check(args) => check(args),
    };
    exit_code(result)
}

/// Log a failed command once and turn it into a failure status.
fn exit_code(result: Result<ExitCode>) -> ExitCode {
    result.unwrap_or_else(|e| {
        error!("{:#}. Exiting.", e);
        ExitCode::FAILURE
    })
}

fn load_inputs(args: &InputArgs) -> Result<(CredentialStore, Vec<WorkItem>)> {
    let credentials = CredentialStore::load(&args.credentials)?;
    let sheets = read_work_items(&args.workbook)?;
    Ok((credentials, into_work_items(sheets)))
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let (credentials, items) = load_inputs(&args.inputs)?;
    let timings = args.timings.apply(Timings::default());

    let engine: Box<dyn ScriptingEngine> = if args.dry_run {
        info!("Dry run: using the simulated SAP GUI");
        Box::new(SimulatedEngine::new())
    } else {
        create_engine()?
    };
    info!(
        engine = engine.name(),
        items = items.len(),
        "Starting batch"
    );

    let report = BatchRunner::new(engine.as_ref(), timings)
        .run(items, &credentials)
        .await;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    println!(
        "{} completed, {} skipped, {} failed",
        report.completed(),
        report.skipped(),
        report.failed()
    );

    if args.fail_on_error && report.has_failures() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn write_report(path: &Path, report: &sapauto::BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

fn check(args: InputArgs) -> Result<ExitCode> {
    let (credentials, items) = load_inputs(&args)?;
    let mut missing = 0;
    for item in &items {
        let found = credentials.resolve(item).is_some();
        if !found {
            missing += 1;
        }
        println!(
            "{:<12} {:<6} {:<16} {}",
            item.system_name,
            item.client,
            item.user,
            if found { "ok" } else { "no password" }
        );
    }
    println!("{} items, {} without password", items.len(), missing);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["sapauto", "run"]).unwrap();
        assert_eq!(cli.log_dir, PathBuf::from("logs"));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.inputs.workbook, PathBuf::from("data/logon_sap.xlsx"));
        assert_eq!(args.inputs.credentials, PathBuf::from("config/credentials.json"));
        assert!(!args.dry_run);
        assert_eq!(args.timings.apply(Timings::default()), Timings::default());
    }

    #[test]
    fn test_timing_overrides() {
        let cli = Cli::try_parse_from([
            "sapauto",
            "run",
            "--connect-timeout",
            "30000",
            "--logon-settle",
            "5000",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let timings = args.timings.apply(Timings::default());
        assert_eq!(timings.connect_timeout, Duration::from_secs(30));
        assert_eq!(timings.logon_settle, Duration::from_secs(5));
        assert_eq!(timings.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_check_with_global_log_dir() {
        let cli =
            Cli::try_parse_from(["sapauto", "check", "--log-dir", "/tmp/x", "--workbook", "w.xlsx"])
                .unwrap();
        assert_eq!(cli.log_dir, PathBuf::from("/tmp/x"));
        assert!(matches!(cli.command, Commands::Check(ref a) if a.workbook == PathBuf::from("w.xlsx")));
    }

    #[test]
    fn test_load_inputs_fails_on_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let args = InputArgs {
            workbook: dir.path().join("logon_sap.xlsx"),
            credentials: dir.path().join("credentials.json"),
        };
        let err = load_inputs(&args).unwrap_err();
        assert!(format!("{err:#}").contains("credentials"));
    }

    #[test]
    fn test_exit_code() {
        let failed = exit_code(Err(anyhow::anyhow!("credentials missing")));
        assert_eq!(format!("{failed:?}"), format!("{:?}", ExitCode::FAILURE));

        let passed = exit_code(Ok(ExitCode::from(2)));
        assert_eq!(format!("{passed:?}"), format!("{:?}", ExitCode::from(2)));
    }

    #[test]
    fn test_write_report() {
        let mut report = sapauto::BatchReport::default();
        report.items.push(sapauto::ItemReport {
            item: WorkItem::new("SYS1", "100", "alice"),
            status: sapauto::ItemStatus::Completed,
            reason: None,
            duration_ms: 12,
        });
        let file = tempfile::NamedTempFile::new().unwrap();

        write_report(file.path(), &report).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(written["items"][0]["status"], "completed");
    }
}
