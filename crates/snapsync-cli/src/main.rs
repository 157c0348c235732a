use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use snapsync_core::app::{App, AppBuilder, Dispatch, SyncConfig};
use snapsync_core::domain::CycleError;
use snapsync_core::engine::Confirmation;
use snapsync_core::impls::{ConnectivityFlag, TokioScheduler};

#[derive(Parser, Debug)]
#[command(name = "snapsync", about = "Offline-first photo backup queue")]
struct Cli {
    /// JSON config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Treat the network as unavailable
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import photos and queue them for upload
    Add {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Run one backup cycle now
    Backup,
    /// Show queue counts and tasks
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Remove every task
    Clear {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
    /// Keep running with the periodic background job until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SyncConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SyncConfig::default(),
    };

    // 単発コマンドではスケジューラに勝手に走らせない
    let scheduler = Arc::new(match cli.command {
        Commands::Run => TokioScheduler::new(),
        _ => TokioScheduler::deferred(),
    });
    let app = AppBuilder::new(config)
        .connectivity(Arc::new(ConnectivityFlag::new(!cli.offline)))
        .scheduler(scheduler.clone())
        .with_default_ports()
        .await?
        .build()?;

    let result = match cli.command {
        Commands::Add { paths } => add(&app, &paths).await,
        Commands::Backup => backup(&app).await,
        Commands::Status { json } => status(&app, json).await,
        Commands::Clear { yes } => clear(&app, yes).await,
        Commands::Run => run(&app).await,
    };
    // 実行中のアップロードを着地させ、タスクを `processing` のまま残さない
    scheduler
        .shutdown_and_join(app.config().upload_timeout())
        .await;
    result
}

async fn add(app: &App, paths: &[PathBuf]) -> anyhow::Result<()> {
    let report = app.foreground().add_photos(paths).await;
    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.source.display(), skipped.error);
    }
    println!("queued {} photo(s)", report.added.len());
    match report.dispatch {
        Dispatch::Processed(outcome) => print_cycle(outcome),
        Dispatch::HandedOff => println!("left for the background job"),
        Dispatch::Ignored => {}
    }
    if report.added.is_empty() && !report.skipped.is_empty() {
        bail!("no photo could be imported");
    }
    Ok(())
}

async fn backup(app: &App) -> anyhow::Result<()> {
    let outcome = app.foreground().backup_now().await;
    print_cycle(outcome);
    match outcome {
        Err(CycleError::Offline) => bail!("cannot back up while offline"),
        _ => Ok(()),
    }
}

async fn status(app: &App, json: bool) -> anyhow::Result<()> {
    app.queue().reload().await;
    let view = app.foreground().status().await;
    let tasks = app.foreground().tasks().await;

    if json {
        let out = serde_json::json!({ "status": view, "tasks": tasks });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", view.headline());
    println!(
        "total={} pending={} processing={} completed={} failed={}",
        view.counts.total,
        view.counts.pending,
        view.counts.processing,
        view.counts.completed,
        view.counts.failed
    );
    if view.exhausted > 0 {
        println!("{} photo(s) reached the retry limit", view.exhausted);
    }
    for task in &tasks {
        println!(
            "{}  {:<10}  retries={}  {}",
            task.id(),
            task.status(),
            task.retries(),
            task.name()
        );
    }
    Ok(())
}

async fn clear(app: &App, yes: bool) -> anyhow::Result<()> {
    let confirmation = if yes {
        Confirmation::Confirmed
    } else {
        Confirmation::Cancelled
    };
    if !app.foreground().clear_all(confirmation).await {
        bail!("refusing to clear without --yes");
    }
    println!("cleared all tasks");
    Ok(())
}

async fn run(app: &App) -> anyhow::Result<()> {
    let counts = app.foreground().initialize().await;
    info!(
        total = counts.total,
        outstanding = counts.outstanding(),
        job = %app.background().name(),
        interval_secs = app.background().options().minimum_interval.as_secs(),
        "snapsync running; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutting down");
    Ok(())
}

fn print_cycle(outcome: Result<snapsync_core::engine::CycleReport, CycleError>) {
    match outcome {
        Ok(report) => println!(
            "uploaded {} of {} ({} failed, {} recovered)",
            report.completed, report.attempted, report.failed, report.recovered
        ),
        Err(e) => println!("no backup: {e}"),
    }
}
