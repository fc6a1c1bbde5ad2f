use clap::{Parser, Subcommand};
use rt_crdt::{Bridge, BridgeConfig, Change, FormatSpan, HostUpdate, TextRun};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bridge configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replays an update log and prints the resulting text runs
    Render {
        log: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Replays an update log and prints the raw format spans as JSON
    Spans { log: PathBuf },
}

/// Either host updates as delivered to a replica, or a bare list of changes.
#[derive(Deserialize)]
#[serde(untagged)]
enum UpdateLog {
    Updates(Vec<HostUpdate>),
    Changes(Vec<Change>),
}

#[derive(Serialize)]
struct RenderOutput<'a> {
    text: String,
    runs: &'a [TextRun],
}

#[derive(Serialize)]
struct SpansOutput<'a> {
    text: &'a str,
    spans: &'a [FormatSpan],
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid update log: {0}")]
    Log(#[from] serde_json::Error),
    #[error(transparent)]
    Crdt(#[from] rt_crdt::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Render { log, json } => render_command(cli.config.as_deref(), log, *json),
        Commands::Spans { log } => spans_command(cli.config.as_deref(), log),
    };
    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn render_command(config: Option<&Path>, log: &Path, json: bool) -> Result<(), CliError> {
    let bridge = replay(config, log)?;
    let view = bridge.view();

    if json {
        let output = RenderOutput {
            text: view.text(),
            runs: view.runs(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if view.runs().is_empty() {
        println!("(empty)");
    }
    for run in view.runs() {
        let marks: Vec<&str> = run.marks.iter().map(|mark| mark.as_str()).collect();
        let label = if marks.is_empty() {
            "plain".to_string()
        } else {
            marks.join("+")
        };
        println!("{label}\t{}", run.text);
    }
    Ok(())
}

fn spans_command(config: Option<&Path>, log: &Path) -> Result<(), CliError> {
    let formatted = replay(config, log)?.formatted()?;
    let output = SpansOutput {
        text: &formatted.text,
        spans: &formatted.spans,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn replay(config: Option<&Path>, log: &Path) -> Result<Bridge<fn(Vec<Change>)>, CliError> {
    let config = load_config(config)?;
    let log: UpdateLog = serde_json::from_str(&read(log)?)?;

    let discard: fn(Vec<Change>) = |_| {};
    let mut bridge = Bridge::new(config, discard)?;
    match log {
        UpdateLog::Updates(updates) => {
            for update in &updates {
                bridge.handle_update(update)?;
            }
        }
        UpdateLog::Changes(changes) => {
            bridge.receive(&changes)?;
        }
    }
    Ok(bridge)
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, CliError> {
    let mut config = match path {
        Some(path) => BridgeConfig::from_json(&read(path)?)?,
        None => BridgeConfig::default(),
    };
    // Replays history only; never author anything.
    config.initial_value.clear();
    Ok(config)
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
