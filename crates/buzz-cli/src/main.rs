mod pidfile;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use buzz_core::{
    TimelineSample, Timeframe, densify, floor_to_step, history_window, now_unix_secs,
    unix_to_iso8601,
};
use buzz_ingest::{AttentionScoreService, IngestConfig, ServiceStatus, UpdateScheduler};
use buzz_store::Store;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const DATA_DIR_ENV: &str = "BUZZ_DATA_DIR";
const DB_FILE_NAME: &str = "buzz.db";
const STATUS_FILE_NAME: &str = "buzz-status.json";

#[derive(Parser)]
#[command(name = "buzz", about = "Attention score ingestion engine")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh all active targets on a fixed interval until interrupted
    Serve {
        /// Run a single update cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Look up the current attention score for a search term
    Score {
        term: String,

        /// Region code, e.g. US or GB (worldwide when omitted)
        #[arg(long)]
        geo: Option<String>,

        /// Upstream timeframe, e.g. "now 7-d" or "today 12-m"
        #[arg(long)]
        timeframe: Option<Timeframe>,
    },

    /// Show per-region interest for a search term
    Regions {
        term: String,

        #[arg(long)]
        geo: Option<String>,

        #[arg(long)]
        timeframe: Option<Timeframe>,
    },

    /// Manage tracked targets
    Targets {
        #[command(subcommand)]
        action: TargetAction,
    },

    /// Print the recorded score history of a target
    History {
        /// Target name or id
        target: String,

        /// Only show the most recent N rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Forward-fill a target's history onto a fixed grid and print it as JSON
    Densify {
        /// Target name or id
        target: String,

        /// Grid step in seconds
        #[arg(long)]
        step_secs: Option<i64>,
    },

    /// Show background refresh status
    Status,
}

#[derive(Subcommand)]
enum TargetAction {
    /// Track a new target
    Add {
        name: String,

        /// Search term to query (defaults to the name)
        #[arg(long)]
        term: Option<String>,
    },
    /// List all targets with their current score
    List,
    /// Resume refreshing a target
    Enable { target: String },
    /// Stop refreshing a target, keeping its history
    Disable { target: String },
}

fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(buzz_store::default_base_dir)
}

fn open_store(data_dir: &Path) -> Result<Store> {
    Store::open(&data_dir.join(DB_FILE_NAME)).context("failed to open score store")
}

fn load_config(data_dir: &Path) -> Result<IngestConfig> {
    IngestConfig::load(data_dir).context("failed to load configuration")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let data_dir = data_dir();

    match &cli.command {
        Commands::Serve { once } => cmd_serve(&data_dir, *once).await,
        Commands::Score {
            term,
            geo,
            timeframe,
        } => cmd_score(&data_dir, term, geo.as_deref(), *timeframe).await,
        Commands::Regions {
            term,
            geo,
            timeframe,
        } => cmd_regions(&data_dir, term, geo.as_deref(), *timeframe).await,
        Commands::Targets { action } => cmd_targets(&data_dir, action),
        Commands::History { target, limit } => cmd_history(&data_dir, target, *limit),
        Commands::Densify { target, step_secs } => cmd_densify(&data_dir, target, *step_secs),
        Commands::Status => cmd_status(&data_dir),
    }
}

// ---------------------------------------------------------------------------
// Background refresh
// ---------------------------------------------------------------------------

async fn cmd_serve(data_dir: &Path, once: bool) -> Result<()> {
    let config = load_config(data_dir)?;
    let store = open_store(data_dir)?;
    let interval = config.update_interval();
    let service = AttentionScoreService::new(config).context("failed to build ingestion service")?;
    let mut scheduler = UpdateScheduler::new(service, store, interval);
    let status_path = data_dir.join(STATUS_FILE_NAME);

    if once {
        let report = scheduler.run_once().await;
        write_status(&status_path, &scheduler.status());
        println!(
            "updated {} targets ({} live, {} cached, {} fallback), {} failed",
            report.updated, report.live, report.cached, report.fallback, report.failed
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());
    let pidfile = pidfile::acquire(data_dir);
    let writer = spawn_status_writer(status_path.clone(), scheduler.subscribe());

    tracing::info!("starting background refresh every {:?}", interval);
    scheduler.run(cancel).await;

    writer.abort();
    write_status(&status_path, &scheduler.status());
    if let Some(path) = pidfile {
        pidfile::release(&path);
    }
    Ok(())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM. The SIGTERM handler is registered
/// before this returns, so a signal sent right after startup is not lost.
#[cfg(unix)]
fn spawn_shutdown_listener(cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let term = signal(SignalKind::terminate());
    tokio::spawn(async move {
        match term {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        tracing::info!("shutdown requested, finishing current cycle");
        cancel.cancel();
    });
}

#[cfg(not(unix))]
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested, finishing current cycle");
        cancel.cancel();
    });
}

/// Mirror every published status to disk for `buzz status`.
fn spawn_status_writer(
    path: PathBuf,
    mut status_rx: watch::Receiver<ServiceStatus>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let status = status_rx.borrow_and_update().clone();
            write_status(&path, &status);
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    })
}

fn write_status(path: &Path, status: &ServiceStatus) {
    let result = serde_json::to_string_pretty(status)
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(path, json));
    if let Err(e) = result {
        tracing::warn!("failed to write {}: {e}", path.display());
    }
}

fn read_status(path: &Path) -> Result<Option<ServiceStatus>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let status = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(status))
}

fn cmd_status(data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let targets = store.list_targets().context("failed to list targets")?;
    let active = targets.iter().filter(|t| t.target.is_active).count();
    let status = read_status(&data_dir.join(STATUS_FILE_NAME))?.unwrap_or_default();

    let serve = match pidfile::running_pid(data_dir) {
        Some(pid) => format!("running (PID {pid})"),
        None => "not running".to_string(),
    };
    let last_update = status
        .last_update
        .map(unix_to_iso8601)
        .unwrap_or_else(|| "never".to_string());

    println!("serve:       {serve}");
    println!("targets:     {} ({active} active)", targets.len());
    println!("cycles:      {}", status.cycle_count);
    println!("errors:      {}", status.error_count);
    println!("last update: {last_update}");
    Ok(())
}

// ---------------------------------------------------------------------------
// One-off lookups
// ---------------------------------------------------------------------------

async fn cmd_score(
    data_dir: &Path,
    term: &str,
    geo: Option<&str>,
    timeframe: Option<Timeframe>,
) -> Result<()> {
    let config = load_config(data_dir)?;
    let geo = geo.unwrap_or(&config.default_geo).to_string();
    let timeframe = timeframe.unwrap_or(config.default_timeframe);
    let mut service = AttentionScoreService::new(config).context("failed to build ingestion service")?;

    let result = service.get_attention_score(term, &geo, timeframe).await;
    service.close();
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_regions(
    data_dir: &Path,
    term: &str,
    geo: Option<&str>,
    timeframe: Option<Timeframe>,
) -> Result<()> {
    let config = load_config(data_dir)?;
    let geo = geo.unwrap_or(&config.default_geo).to_string();
    let timeframe = timeframe.unwrap_or(config.default_timeframe);
    let mut service = AttentionScoreService::new(config).context("failed to build ingestion service")?;

    let regions = service.get_region_breakdown(term, &geo, timeframe).await;
    service.close();
    if regions.is_empty() {
        println!("(no regional data)");
    }
    for region in regions {
        println!("{:>5.0}  {} ({})", region.value, region.geo_name, region.geo_code);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Targets and history
// ---------------------------------------------------------------------------

fn cmd_targets(data_dir: &Path, action: &TargetAction) -> Result<()> {
    let store = open_store(data_dir)?;
    match action {
        TargetAction::Add { name, term } => {
            let term = term.as_deref().unwrap_or(name);
            let target = store
                .add_target(name, term)
                .with_context(|| format!("failed to add target '{name}'"))?;
            println!("added {} → \"{}\" ({})", target.name, target.search_term, target.id);
        }
        TargetAction::List => {
            let targets = store.list_targets().context("failed to list targets")?;
            if targets.is_empty() {
                println!("(no targets)");
            }
            for summary in targets {
                let score = summary
                    .current_score
                    .map(|s| format!("{s:.1}"))
                    .unwrap_or_else(|| "-".to_string());
                let state = if summary.target.is_active { "active" } else { "disabled" };
                println!(
                    "{:<24} {:>6}  {:<8} \"{}\"",
                    summary.target.name, score, state, summary.target.search_term
                );
            }
        }
        TargetAction::Enable { target } => set_active(&store, target, true)?,
        TargetAction::Disable { target } => set_active(&store, target, false)?,
    }
    Ok(())
}

fn set_active(store: &Store, name_or_id: &str, active: bool) -> Result<()> {
    let target = store
        .find_target(name_or_id)
        .with_context(|| format!("unknown target '{name_or_id}'"))?;
    store.set_active(target.id, active)?;
    println!(
        "{} {}",
        if active { "enabled" } else { "disabled" },
        target.name
    );
    Ok(())
}

fn cmd_history(data_dir: &Path, name_or_id: &str, limit: Option<usize>) -> Result<()> {
    let store = open_store(data_dir)?;
    let target = store
        .find_target(name_or_id)
        .with_context(|| format!("unknown target '{name_or_id}'"))?;
    let history = store.history(target.id, limit)?;

    if history.is_empty() {
        println!("(no history for {})", target.name);
    }
    for record in history {
        println!(
            "{}  {:>5.1}  {:<8}  {:.1}",
            unix_to_iso8601(record.timestamp),
            record.score,
            record.source.as_str(),
            record.confidence
        );
    }
    Ok(())
}

fn cmd_densify(data_dir: &Path, name_or_id: &str, step_secs: Option<i64>) -> Result<()> {
    let config = load_config(data_dir)?;
    let store = open_store(data_dir)?;
    let target = store
        .find_target(name_or_id)
        .with_context(|| format!("unknown target '{name_or_id}'"))?;

    let step = step_secs.unwrap_or(config.grid_step_secs);
    if step <= 0 {
        bail!("--step-secs must be positive, got {step}");
    }

    let samples: Vec<TimelineSample> = store
        .history(target.id, None)?
        .into_iter()
        .map(|record| TimelineSample::at(record.timestamp, record.score))
        .collect();

    let dense = match store.first_observed(target.id)? {
        Some(first) => {
            let (start, end) =
                history_window(first, now_unix_secs(), config.densify_max_window_secs());
            densify(&samples, step, floor_to_step(start, step), end)
        }
        None => Vec::new(),
    };
    println!("{}", serde_json::to_string_pretty(&dense)?);
    Ok(())
}
