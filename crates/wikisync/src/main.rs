mod config;
mod scan;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wikisync_core::{CapabilityBridge, StatusSnapshot, SyncOutcome, SyncStatusMonitor};
use wikisync_git::GitCli;
use wikisync_logging::{init_tracing, LogFormat};
use wikisync_store::FileStateStore;

use crate::config::{ConfiguredWorkspaces, WikiSyncConfig};
use crate::scan::scan_folders;

#[derive(Parser, Debug)]
#[command(
    name = "wikisync",
    about = "Git sync status and one-click sync for wiki folders",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: ./wikisync.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds, overrides the config file
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also append JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Print status and outcomes as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check once and print the sync button
    Status {
        /// Rescan the folders with git first
        #[arg(long)]
        refresh: bool,
    },
    /// Keep checking and print the button whenever it changes
    Watch {
        /// Seconds between git rescans (0 = never)
        #[arg(long, default_value_t = 10)]
        rescan_secs: u64,
    },
    /// Commit and push every folder with changes
    Sync,
    /// Refresh the cached modified-file lists from git
    Scan,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Services and monitor wired from the config file
struct App {
    git: Arc<GitCli>,
    store: Arc<FileStateStore>,
    workspaces: Arc<ConfiguredWorkspaces>,
    monitor: Arc<SyncStatusMonitor>,
    json: bool,
}

impl App {
    fn build(config: &WikiSyncConfig, cli: &Cli) -> Result<Self> {
        let store = match &config.state_dir {
            Some(dir) => FileStateStore::open(dir.clone()),
            None => FileStateStore::open_default(),
        }
        .context("Failed to open state directory")?;

        let mut git = GitCli::new();
        if let Some(binary) = &config.git_binary {
            git = git.with_binary(binary.clone());
        }
        if let Some(message) = &config.commit_message {
            git = git.with_commit_message(message.clone());
        }

        let folders = config.folders();
        if folders.is_empty() {
            warn!("No [[workspace]] entries configured");
        }

        let git = Arc::new(git);
        let store = Arc::new(store);
        let workspaces = Arc::new(ConfiguredWorkspaces::new(folders));
        let bridge = Arc::new(CapabilityBridge::with_services(
            workspaces.clone(),
            git.clone(),
        ));
        let monitor_config = config.monitor_config(cli.interval_ms.map(Duration::from_millis));
        let monitor = Arc::new(SyncStatusMonitor::new(
            bridge,
            store.clone(),
            monitor_config,
        ));

        Ok(Self {
            git,
            store,
            workspaces,
            monitor,
            json: cli.json,
        })
    }

    async fn scan(&self) -> Vec<scan::FolderScan> {
        scan_folders(
            &self.git,
            &*self.store,
            self.workspaces.folders(),
        )
        .await
    }

    fn print_snapshot(&self, snapshot: &StatusSnapshot) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(snapshot)?);
        } else {
            println!("{}", ui::render_button(snapshot));
        }
        Ok(())
    }

    fn spawn_rescan(&self, every: Duration) -> JoinHandle<()> {
        let git = self.git.clone();
        let store = self.store.clone();
        let folders = self.workspaces.folders().to_vec();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                scan_folders(&git, &*store, &folders).await;
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_tracing(
        &cli.log_level,
        cli.log_format.into(),
        cli.log_file.as_deref(),
    )
    .context("Failed to initialize logging")?;

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = WikiSyncConfig::load_or_default(cli.config.as_deref(), &working_dir)?;
    let app = App::build(&config, &cli)?;

    match cli.command {
        Command::Status { refresh } => status(&app, refresh).await,
        Command::Watch { rescan_secs } => watch_status(&app, rescan_secs).await,
        Command::Sync => sync(&app).await,
        Command::Scan => scan_command(&app).await,
    }
}

async fn status(app: &App, refresh: bool) -> Result<()> {
    if refresh {
        app.scan().await;
    }
    app.monitor.poll_once().await?;
    app.print_snapshot(&app.monitor.snapshot())
}

async fn watch_status(app: &App, rescan_secs: u64) -> Result<()> {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .context("Failed to set Ctrl+C handler")?;

    app.scan().await;
    let rescan = (rescan_secs > 0).then(|| app.spawn_rescan(Duration::from_secs(rescan_secs)));

    let mut updates = app.monitor.subscribe();
    let handle = app.monitor.start();
    let mut shown: Option<StatusSnapshot> = None;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    // Every cycle notifies; only print what changed
                    let changed = shown.as_ref().map_or(true, |last| {
                        last.status != snapshot.status || last.pending_count != snapshot.pending_count
                    });
                    if changed {
                        app.print_snapshot(&snapshot)?;
                        shown = Some(snapshot);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Status updates lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = stop_rx.changed() => break,
        }
    }

    handle.stop().await;
    if let Some(task) = rescan {
        task.abort();
    }
    eprintln!("\nStopped watching.");
    Ok(())
}

async fn sync(app: &App) -> Result<()> {
    app.scan().await;
    app.monitor.poll_once().await?;

    let outcome = app.monitor.on_sync_triggered().await;

    if app.json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    // Re-check so the button reflects what actually got pushed
    app.scan().await;
    app.monitor.poll_once().await?;
    if !app.json {
        println!("{}", ui::render_button(&app.monitor.snapshot()));
    }

    match outcome {
        SyncOutcome::Completed { failed, .. } if !failed.is_empty() => {
            anyhow::bail!("Sync failed for: {}", failed.join(", "))
        }
        SyncOutcome::Failed { error } => anyhow::bail!("Sync failed: {}", error),
        SyncOutcome::TimedOut => anyhow::bail!("Sync timed out"),
        _ => Ok(()),
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    use colored::Colorize;

    match outcome {
        SyncOutcome::Skipped => println!("{}", "Nothing to sync".dimmed()),
        SyncOutcome::Completed { synced, failed } => {
            for folder in synced {
                println!("{} {}", "synced".green(), folder);
            }
            for folder in failed {
                println!("{} {}", "failed".red(), folder);
            }
        }
        SyncOutcome::Failed { error } => println!("{} {}", "error".red(), error),
        SyncOutcome::TimedOut => println!("{}", "Sync timed out".red()),
    }
}

async fn scan_command(app: &App) -> Result<()> {
    use colored::Colorize;

    for scan in app.scan().await {
        match scan.result {
            Ok(count) => println!("{} {} modified", scan.folder, count),
            Err(e) => println!("{} {}: {:#}", "error".red(), scan.folder, e),
        }
    }
    Ok(())
}
