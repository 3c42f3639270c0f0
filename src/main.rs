use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, error, info};
use tokio::sync::mpsc;

mod archive;
mod assets;
mod config;
mod engine;
mod env;
mod error;
mod logging;
mod manifest;
mod networking;
mod servers;
mod storage;
mod updater;
mod util;

use assets::{AssetCatalog, AssetSync};
use config::LauncherConfig;
use engine::LauncherEngine;
use engine::state::{AppState, UserAction};
use logging::StatusLog;
use networking::NetworkClient;
use storage::{GameDirectory, StorageManager};
use updater::{Updater, UpdaterConfig};

#[derive(Parser, Debug)]
#[command(
    name = "quarzism-launcher",
    author,
    version,
    about = "Self-updating launcher that keeps a game directory in sync with the Quarzism client"
)]
struct Cli {
    /// Path to launcher.json (defaults to the launcher data directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Game directory to import settings, servers and texture packs into.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Directory holding the launcher's own files and version marker.
    #[arg(long)]
    install_dir: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Print state transitions as JSON lines.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Bring the launcher's files up to date.
    Update,
    /// Import settings, the server list and texture packs.
    Sync,
    /// Update, then sync.
    Run,
}

impl Command {
    fn actions(self) -> &'static [UserAction] {
        match self {
            Command::Update => &[UserAction::CheckForUpdates],
            Command::Sync => &[UserAction::SyncAssets],
            Command::Run => &[UserAction::CheckForUpdates, UserAction::SyncAssets],
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let app_dir = match env::ensure_app_dir() {
        Ok(dir) => dir,
        Err(err) => {
            error!("could not create {}: {err}", env::default_app_dir().display());
            return ExitCode::FAILURE;
        }
    };
    let config_path = cli.config.clone().unwrap_or_else(env::config_path);
    let config = LauncherConfig::load_or_default(&config_path);

    let install_dir = cli
        .install_dir
        .clone()
        .or_else(|| config.install_dir.clone())
        .unwrap_or_else(env::install_dir);
    // Backups sit next to the install directory.
    let backup_dir = install_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.join("backup"))
        .unwrap_or_else(env::backup_dir);
    let game_dir = cli
        .dir
        .clone()
        .or_else(|| config.game_dir.clone())
        .unwrap_or_else(env::game_dir);
    info!(
        "launcher data in {}, game directory {}",
        app_dir.display(),
        game_dir.display()
    );

    // The captured lines are only replayed in human-readable mode.
    let status = if cli.json {
        StatusLog::new("launcher")
    } else {
        StatusLog::capturing("launcher")
    };
    let client = NetworkClient::new(config.request_timeout());
    let updater = Updater::new(
        client.clone(),
        StorageManager::new(install_dir, backup_dir),
        UpdaterConfig {
            version_url: config.version_url(),
            manifest_url: config.manifest_url(),
            fallback: manifest::fallback_entries(&config.remote_base),
        },
        status.child("updater"),
    );
    let assets = AssetSync::new(
        GameDirectory::new(game_dir),
        client,
        AssetCatalog::from_config(&config),
        status.child("assets"),
    );
    let mut engine = LauncherEngine::new(updater, assets, status.child("engine"));

    let actions = cli.command.unwrap_or(Command::Run).actions();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(async move {
        let mut all_ok = true;
        for action in actions {
            all_ok &= engine.handle_action(*action, &tx).await;
        }
        debug!("engine finished in state {:?}", engine.state);
        all_ok
    });

    while let Some(state) = rx.recv().await {
        print_state(&state, cli.json);
    }

    match worker.await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            let lines = status.lines();
            if !lines.is_empty() {
                eprintln!("Status log:");
                for line in lines {
                    eprintln!("  {line}");
                }
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("launcher task aborted: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_state(state: &AppState, json: bool) {
    if json {
        match serde_json::to_string(state) {
            Ok(line) => println!("{line}"),
            Err(err) => error!("could not serialize state: {err}"),
        }
        return;
    }

    match state {
        AppState::Idle => {}
        AppState::CheckingForUpdates => println!("Checking for updates..."),
        AppState::Updating { file, progress } => println!("[{progress:>5.1}%] {file}"),
        AppState::Updated(report) => print!("{}", updater::format_report(report)),
        AppState::ReadyToLaunch { version } => println!("Ready to launch version {version}"),
        AppState::SyncingAssets => println!("Importing game assets..."),
        AppState::AssetsSynced(report) => print!("{}", assets::format_report(report)),
        AppState::Error(message) => eprintln!("Error: {message}"),
    }
}
