use std::{
    error::Error,
    io::IsTerminal,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDate;
use clap::Parser;
use dialoguer::{Confirm, theme::ColorfulTheme};
use postpurge::{
    config::PurgeConfig,
    ledger::{FileLedger, LedgerStore},
    observability,
    pipeline::{RunControl, StopReason, TracingObserver},
    report::CompletionSummary,
    runner::{self, Plan, RunOutcome, Runner},
};

type CliResult = Result<(), Box<dyn Error>>;

/// CLI arguments for postpurge
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Bulk-delete posts listed in an exported archive",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ./postpurge.toml, then
    /// ~/.config/postpurge/postpurge.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Delete the posts selected from an archive
    Run {
        /// Archive file (e.g. data/tweets.js)
        archive: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Do not export a JSON report
        #[arg(long)]
        no_report: bool,
    },
    /// Show what a run would delete without deleting anything
    Plan {
        archive: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Retry the posts that failed in the previous run
    Resume {
        #[command(flatten)]
        overrides: Overrides,
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        no_report: bool,
    },
    /// Inspect or discard the failed-item ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to ~/.config/postpurge/postpurge.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum LedgerCommand {
    /// List the ids recorded as failed
    Show,
    /// Remove all recorded ids
    Clear,
}

/// Per-invocation overrides of config values.
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Only delete posts created on or before this date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "delete_all")]
    before: Option<NaiveDate>,
    /// Ignore dates and delete every non-protected post
    #[arg(long)]
    delete_all: bool,
    /// Also delete posts from the last 7 days
    #[arg(long)]
    no_keep_recent: bool,
    /// Simulate deletions without contacting the endpoint
    #[arg(long)]
    test_mode: bool,
    /// Number of concurrent workers (1-5)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Post id to keep (repeatable)
    #[arg(long = "protect", value_name = "ID")]
    protect: Vec<String>,
}

impl Overrides {
    fn apply(&self, config: &mut PurgeConfig) {
        if let Some(before) = self.before {
            config.selection.before = Some(before);
            config.selection.delete_all = false;
        }
        if self.delete_all {
            config.selection.delete_all = true;
        }
        if self.no_keep_recent {
            config.selection.keep_recent = false;
        }
        if self.test_mode {
            config.deletion.test_mode = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.deletion.concurrency = concurrency;
        }
        for id in &self.protect {
            if !config.selection.protected_ids.contains(id) {
                config.selection.protected_ids.push(id.clone());
            }
        }
    }
}

/// Commented default configuration written by `postpurge init`.
fn default_config_toml() -> &'static str {
    r#"# postpurge configuration

# Session of a logged-in browser. Copy the full Cookie header from the
# browser's developer tools into POSTPURGE_COOKIE; never write it here.
[session]
cookie = "${POSTPURGE_COOKIE}"
# csrf_token = "..."      # defaults to the ct0 cookie
# bearer_token = "..."    # defaults to the public web client token

[selection]
# Delete posts created on or before this date (defaults to one year ago).
# before = "2023-01-01"
# delete_all = false
# Never delete posts from the last 7 days.
keep_recent = true
# protected_ids = ["1234567890"]

[deletion]
concurrency = 2
delete_delay_ms = 100
max_retries = 3
rate_limit_wait_secs = 60
max_failed = 20
pause_every = 100
pause_duration_ms = 2000
# Simulate deletions without sending requests.
test_mode = false

[report]
auto_export = true
# dir = "~/postpurge-reports"

[observability.logging]
level = "info"
format = "compact"
"#
}

/// Get the default config file path.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("postpurge").join("postpurge.toml"))
}

/// Get the default ledger path.
fn default_ledger_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("postpurge"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("failed.json")
}

/// Resolve the config path. `None` means no config file exists and
/// defaults apply.
fn resolve_config_path(explicit_path: Option<&str>) -> Result<Option<PathBuf>, String> {
    if let Some(path) = explicit_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path));
    }

    let cwd_config = PathBuf::from("postpurge.toml");
    if cwd_config.exists() {
        return Ok(Some(cwd_config));
    }

    if let Some(default_path) = default_config_path()
        && default_path.exists()
    {
        return Ok(Some(default_path));
    }

    Ok(None)
}

/// Load config, apply overrides, validate, and start logging.
fn load_config(explicit_config_path: Option<&str>, overrides: &Overrides) -> PurgeConfig {
    let config_path = match resolve_config_path(explicit_config_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut config = match &config_path {
        Some(path) => match PurgeConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => PurgeConfig::default(),
    };

    overrides.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match &config_path {
        Some(path) => tracing::debug!(config_file = %path.display(), "Loaded configuration"),
        None => tracing::info!("No config file found, using defaults (see `postpurge init`)"),
    }

    config
}

fn ledger_store(config: &PurgeConfig) -> Arc<FileLedger> {
    let path = config
        .state
        .ledger_path
        .clone()
        .unwrap_or_else(default_ledger_path);
    Arc::new(FileLedger::new(path))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config_path = args.config.as_deref();

    let result = match args.command {
        Command::Init { output, force } => {
            run_init(output, force);
            Ok(())
        }
        Command::Plan { archive, overrides } => {
            run_plan(load_config(config_path, &overrides), &archive).await
        }
        Command::Run {
            archive,
            overrides,
            yes,
            no_report,
        } => run_purge(load_config(config_path, &overrides), &archive, yes, no_report).await,
        Command::Resume {
            overrides,
            yes,
            no_report,
        } => run_resume(load_config(config_path, &overrides), yes, no_report).await,
        Command::Ledger { action } => {
            run_ledger(load_config(config_path, &Overrides::default()), action).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

/// Create a default configuration file.
fn run_init(output: Option<String>, force: bool) {
    let Some(output_path) = output.map(PathBuf::from).or_else(default_config_path) else {
        eprintln!("Could not determine default config path. Please specify one with --output.");
        std::process::exit(1);
    };

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("Export your browser session cookie, then preview a run:");
    println!("  export POSTPURGE_COOKIE='...'");
    println!("  postpurge plan path/to/tweets.js");
}

fn print_plan(plan: &Plan) {
    let selection = &plan.selection;
    println!("Archive format: {}", plan.format);
    println!("Found:      {}", selection.total());
    println!("To delete:  {}", selection.eligible.len());
    println!("Skipped:    {}", selection.skipped.len());
    println!("Protected:  {}", selection.protected.len());
    if plan.dropped > 0 {
        println!("Invalid:    {} (ignored)", plan.dropped);
    }
    match selection.cutoff {
        Some(cutoff) => println!("Cutoff:     {}", cutoff.format("%Y-%m-%d %H:%M UTC")),
        None => println!("Cutoff:     none (delete all)"),
    }
}

async fn run_plan(config: PurgeConfig, archive: &Path) -> CliResult {
    let plan = runner::plan(&config, archive).await?;
    print_plan(&plan);
    Ok(())
}

fn confirm(prompt: String) -> Result<bool, dialoguer::Error> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
}

async fn run_purge(config: PurgeConfig, archive: &Path, yes: bool, no_report: bool) -> CliResult {
    let control = RunControl::new();
    let ledger = ledger_store(&config);
    let runner = Runner::from_config(config, ledger, control.clone())?
        .with_observer(Arc::new(TracingObserver::default()));

    let plan = runner.plan(archive).await?;
    print_plan(&plan);

    if plan.selection.eligible.is_empty() {
        println!();
        println!("Nothing to delete.");
        return Ok(());
    }

    let mode = if runner.config().deletion.test_mode {
        " (test mode)"
    } else {
        ""
    };
    if !yes
        && !confirm(format!(
            "Delete {} posts{mode}? This cannot be undone",
            plan.selection.eligible.len()
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    spawn_controls(control);
    let outcome = runner.execute(plan.selection).await?;

    finish(&runner, &outcome, no_report).await;
    Ok(())
}

async fn run_resume(config: PurgeConfig, yes: bool, no_report: bool) -> CliResult {
    let control = RunControl::new();
    let ledger = ledger_store(&config);
    let pending = ledger.load().await?;
    println!("Ledger: {} ({} ids)", ledger.path().display(), pending.len());

    if pending.is_empty() {
        println!("Nothing to resume.");
        return Ok(());
    }
    if !yes && !confirm(format!("Retry {} posts?", pending.len()))? {
        println!("Cancelled.");
        return Ok(());
    }

    let runner = Runner::from_config(config, ledger, control.clone())?
        .with_observer(Arc::new(TracingObserver::default()));

    spawn_controls(control);
    let outcome = runner.resume().await?;

    finish(&runner, &outcome, no_report).await;
    Ok(())
}

async fn run_ledger(config: PurgeConfig, action: LedgerCommand) -> CliResult {
    let ledger = ledger_store(&config);
    match action {
        LedgerCommand::Show => {
            let ids = ledger.load().await?;
            println!("Ledger: {}", ledger.path().display());
            if ids.is_empty() {
                println!("No failed ids recorded.");
            }
            for id in &ids {
                println!("{id}");
            }
        }
        LedgerCommand::Clear => {
            ledger.clear().await?;
            println!("Ledger cleared: {}", ledger.path().display());
        }
    }
    Ok(())
}

/// Print the summary and export the report.
async fn finish(runner: &Runner, outcome: &RunOutcome, no_report: bool) {
    println!();
    println!("{}", CompletionSummary::from_pass(&outcome.summary));

    let config = runner.config();
    if config.report.auto_export && !no_report {
        let dir = config.report.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        match runner.export_report(&outcome.report, &dir).await {
            Ok(path) => println!("Report: {}", path.display()),
            Err(e) => eprintln!("Warning: failed to export report: {}", e),
        }
    }

    let summary = &outcome.summary;
    if !summary.failed_ids.is_empty() {
        println!(
            "{} posts failed; run `postpurge resume` to retry them.",
            summary.failed_ids.len()
        );
    }
    if summary.stop_reason != StopReason::Completed {
        println!(
            "Suggested concurrency for the next run: {}",
            summary.next_concurrency
        );
    }
}

/// Stop on Ctrl-C, and on an interactive stdin toggle pause with `p` and
/// stop with `s`.
fn spawn_controls(control: RunControl) {
    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after in-flight requests");
                control.stop();
            }
        });
    }

    if !std::io::stdin().is_terminal() {
        return;
    }
    println!("Type p + Enter to pause/resume, s + Enter to stop.");

    // A plain thread: a blocking stdin read cannot be cancelled and would
    // hold up runtime shutdown.
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if control.is_stopped() {
                break;
            }
            match line.trim() {
                "p" => {
                    if control.toggle_pause() {
                        println!("Paused. Type p + Enter to resume.");
                    } else {
                        println!("Resumed.");
                    }
                }
                "s" => {
                    println!("Stopping after in-flight requests...");
                    control.stop();
                    break;
                }
                _ => {}
            }
        }
    });
}
