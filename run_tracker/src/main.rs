use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use run_tracker::{
    clock::{ManualClock, SystemClock},
    config::TrackerConfig,
    host::HostEvent,
    retention::{prune_sessions, retention_cutoff},
    TrackerService, TrackingEngine,
};
use run_tracker_data_management::{RunDatabase, RunStore};
use run_tracker_lib::{polyline, snapshot::Snapshot};
use tokio::{io::{AsyncBufReadExt, BufReader}, sync::watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "RunTracker")]
#[command(about = "Tracks runs from a stream of position fixes", long_about = None)]
struct Cli {
    /// key = value config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Database file, overrides the config
    #[arg(long)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track live from newline-delimited JSON events on stdin.
    /// An interrupted session is recovered first
    Record,
    /// Feed a recorded event log through the tracker, timed by the event timestamps
    Replay { file: PathBuf },
    /// List finished sessions
    List,
    /// Print a session as JSON
    Show { session_id: String },
    /// Delete finished sessions older than the retention period
    Prune {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON output, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=info,run_tracker_data_management=info", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    let db = RunDatabase::connect(&config.database_path).await?;

    match cli.command {
        Commands::Record => record(db, &config).await,
        Commands::Replay { file } => replay(db, &config, &file).await,
        Commands::List => list(&db).await,
        Commands::Show { session_id } => show(&db, &session_id).await,
        Commands::Prune { days } => prune(&db, days.unwrap_or(config.retention_days)).await,
    }
}

async fn record(db: RunDatabase, config: &TrackerConfig) -> anyhow::Result<()> {
    let engine = TrackingEngine::new(db, SystemClock, config.filter());
    let (handle, service) = TrackerService::spawn(engine, config.checkpoint_interval);

    match handle.recover().await {
        Ok(true) => tracing::info!("Resumed interrupted session {:?}", handle.snapshot().session_id),
        Ok(false) => {}
        Err(err) => tracing::error!("Recovery failed: {err}"),
    }

    let progress = tokio::spawn(report_progress(handle.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("Skipping unreadable event {line:?}: {err}");
                continue;
            }
        };

        let result = match event {
            HostEvent::Start { session_id, .. } => handle.start(session_id).await
                .map(|session_id| println!("{}", serde_json::json!({ "started": session_id }))),
            HostEvent::Pause { .. } => handle.pause().await,
            HostEvent::Resume { .. } => handle.resume().await,
            HostEvent::Stop { .. } => match handle.stop().await {
                Ok(summary) => {
                    println!("{}", serde_json::to_string(&summary)?);
                    Ok(())
                }
                Err(err) => Err(err),
            },
            HostEvent::Fix(fix) => handle.ingest(fix).await,
        };

        if let Err(err) = result {
            tracing::error!("{err}");
        }
    }

    if let Some(session_id) = handle.snapshot().session_id {
        tracing::info!("Input closed with session {session_id} still open, it will be recovered on the next run");
        if let Err(err) = handle.checkpoint().await {
            tracing::error!("Final checkpoint failed: {err}");
        }
    }

    drop(handle);
    service.await?;
    progress.await?;
    Ok(())
}

/// Logs progress every 100 m, the way a status notification would show it.
async fn report_progress(mut snapshots: watch::Receiver<Snapshot>) {
    let mut reported = 0;

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if !snapshot.tracking {
            reported = 0;
            continue;
        }

        let hundreds = (snapshot.distance / 100.) as u64;
        if hundreds > reported {
            reported = hundreds;
            tracing::info!(
                "Distance: {:.2} km, {}, avg {:.2} m/s",
                snapshot.distance / 1000.,
                format_duration(snapshot.duration),
                snapshot.avg_speed
            );
        }
    }
}

async fn replay(db: RunDatabase, config: &TrackerConfig, file: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file).await
        .with_context(|| format!("Failed to read event log {:?}", file))?;

    let clock = ManualClock::default();
    let mut engine = TrackingEngine::new(db, clock.clone(), config.filter());

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        if let Some(timestamp) = event.timestamp() {
            clock.set(timestamp);
        }

        match event {
            HostEvent::Start { session_id, .. } => {
                engine.start(session_id).await?;
            }
            HostEvent::Pause { .. } => engine.pause()?,
            HostEvent::Resume { .. } => engine.resume()?,
            HostEvent::Stop { .. } => {
                let summary = engine.stop().await?;
                println!("{}", serde_json::to_string(&summary)?);
            }
            HostEvent::Fix(fix) => {
                let outcome = engine.ingest(fix).await;
                tracing::debug!("Line {}: {:?}", index + 1, outcome);
            }
        }
    }

    if let Some(session_id) = engine.session_id() {
        tracing::warn!("Log ended with session {session_id} still open");
        engine.checkpoint().await?;
    }

    Ok(())
}

async fn list(db: &RunDatabase) -> anyhow::Result<()> {
    for session in db.list_finished_sessions().await? {
        let start = DateTime::<Utc>::from_timestamp_millis(session.start_time)
            .map(|time| time.format("%d/%m/%Y %H:%M (UTC)").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{}\t{}\t{}\t{:.2} km",
            session.session_id,
            start,
            format_duration(session.duration),
            session.distance / 1000.
        );
    }

    Ok(())
}

async fn show(db: &RunDatabase, session_id: &str) -> anyhow::Result<()> {
    let Some(session) = db.get_session_by_id(session_id).await? else {
        anyhow::bail!("No session with id {session_id}");
    };

    let raw_points = db.get_raw_points_for_session(session_id).await?;
    let path = polyline::decode(&session.encoded_path)?;

    println!("{}", serde_json::json!({
        "session": session,
        "path_points": path.len(),
        "raw_points": raw_points.len(),
    }));

    Ok(())
}

async fn prune(db: &RunDatabase, days: u32) -> anyhow::Result<()> {
    let cutoff = retention_cutoff(Utc::now(), days)
        .with_context(|| format!("Retention of {days} days is out of range"))?;

    let removed = prune_sessions(db, cutoff).await?;
    tracing::info!("Removed {removed} sessions older than {days} days");

    Ok(())
}

fn format_duration(millis: i64) -> String {
    let seconds = millis / 1000;
    format!("{}:{:02}:{:02}", seconds / 3600, seconds / 60 % 60, seconds % 60)
}
