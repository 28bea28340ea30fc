//! Command-line front-end for the script launcher.
//!
//! Streams a run's combined output to stdout and records each run in the
//! persisted history, mirroring what a GUI caller would do through
//! [`launcher::supervisor`].

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use launcher::core::outcome::{ExitDisposition, RunOutcome};
use launcher::exit_codes;
use launcher::io::environments::{CondaResolver, EnvironmentResolver, default_interpreter};
use launcher::io::history_store::HistoryStore;
use launcher::io::scripts::{config_filename_for, list_scripts};
use launcher::launch::{LaunchRequest, run_launch};
use launcher::logging;
use launcher::supervisor::{OutputSink, Supervisor};

#[derive(Parser)]
#[command(
    name = "launcher",
    version,
    about = "Run scripts with their configs and record run history"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script, streaming its output until it finishes.
    Run {
        /// Path to the script to execute.
        script: PathBuf,
        /// Configuration file passed to the script as `--config <path>`.
        /// Defaults to `<stem>_config.yml` next to the script when present.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Named environment to run inside (e.g. a conda environment).
        #[arg(long)]
        env: Option<String>,
        /// Override the history file location.
        #[arg(long, value_name = "PATH")]
        history_file: Option<PathBuf>,
    },
    /// List execution environments available on this machine.
    Envs,
    /// List runnable scripts in a directory.
    Scripts {
        /// Directory to scan. Defaults to the current directory.
        dir: Option<PathBuf>,
    },
    /// Print recorded runs, most recent first.
    History {
        /// Show at most this many entries.
        #[arg(long)]
        limit: Option<usize>,
        /// Override the history file location.
        #[arg(long, value_name = "PATH")]
        history_file: Option<PathBuf>,
    },
    /// Create an empty history store if none exists.
    Init {
        /// Override the history file location.
        #[arg(long, value_name = "PATH")]
        history_file: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            script,
            config,
            env,
            history_file,
        } => cmd_run(script, config, env, history_file),
        Command::Envs => cmd_envs(),
        Command::Scripts { dir } => cmd_scripts(dir),
        Command::History {
            limit,
            history_file,
        } => cmd_history(limit, history_file),
        Command::Init { history_file } => cmd_init(history_file),
    }
}

/// Sink that relays chunks straight to stdout.
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn on_chunk(&self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn on_outcome(&self, _outcome: &RunOutcome) {}
}

fn cmd_run(
    script: PathBuf,
    config: Option<PathBuf>,
    env: Option<String>,
    history_file: Option<PathBuf>,
) -> Result<i32> {
    let interpreter = default_interpreter()?;
    let resolver = Arc::new(CondaResolver::new(interpreter.clone()));
    let supervisor = Supervisor::new(resolver, interpreter);
    let history = history_store(history_file)?;

    let config = config.or_else(|| conventional_config(&script));
    let request = LaunchRequest {
        script,
        config,
        environment: env,
    };
    let outcome = run_launch(&request, &supervisor, Arc::new(StdoutSink), &history)?;

    if outcome.success {
        eprintln!("run completed successfully");
        Ok(exit_codes::OK)
    } else {
        eprintln!("run failed ({})", describe_exit(&outcome));
        if !outcome.stderr_tail.is_empty() {
            eprintln!("{}", outcome.stderr_tail.trim_end());
        }
        Ok(exit_codes::RUN_FAILED)
    }
}

fn cmd_envs() -> Result<i32> {
    let resolver = CondaResolver::new(default_interpreter()?);
    for name in resolver.list()? {
        println!("{name}");
    }
    Ok(exit_codes::OK)
}

fn cmd_scripts(dir: Option<PathBuf>) -> Result<i32> {
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    for script in list_scripts(&dir)? {
        println!("{}", script.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_history(limit: Option<usize>, history_file: Option<PathBuf>) -> Result<i32> {
    let history = history_store(history_file)?;
    let entries = history.load_all()?;
    for entry in entries.iter().take(limit.unwrap_or(entries.len())) {
        let status = if entry.success { "ok" } else { "failed" };
        println!(
            "{}  {:<6}  {}  env={}  {}",
            entry.timestamp,
            status,
            entry.script,
            entry.environment.as_deref().unwrap_or("-"),
            entry.command
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_init(history_file: Option<PathBuf>) -> Result<i32> {
    let history = history_store(history_file)?;
    history.ensure_initialized()?;
    println!("history initialized at {}", history.path().display());
    Ok(exit_codes::OK)
}

/// Config conventionally paired with `script`, when it exists on disk.
fn conventional_config(script: &std::path::Path) -> Option<PathBuf> {
    let candidate = script.parent()?.join(config_filename_for(script));
    candidate.exists().then_some(candidate)
}

fn history_store(path: Option<PathBuf>) -> Result<HistoryStore> {
    let path = match path {
        Some(path) => path,
        None => HistoryStore::default_path()?,
    };
    Ok(HistoryStore::new(path))
}

fn describe_exit(outcome: &RunOutcome) -> String {
    match outcome.exit {
        Some(ExitDisposition::Code(code)) => format!("exit code {code}"),
        Some(ExitDisposition::Terminated) => "terminated".to_string(),
        Some(ExitDisposition::Killed) => "killed".to_string(),
        None => "failed to launch".to_string(),
    }
}
