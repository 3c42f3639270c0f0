use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tokio::fs;

use crate::archive;
use crate::config::LauncherConfig;
use crate::error::SyncError;
use crate::logging::StatusLog;
use crate::networking::Fetch;
use crate::servers::{self, ServerEntry};
use crate::storage::{GameDirectory, confined_join};

const SETTINGS_FILE: &str = "options.txt";
const SERVERS_FILE: &str = "servers.dat";
const RESOURCE_PACKS_DIR: &str = "resourcepacks";

const SERVERS: &[(&str, &str)] = &[
    ("ExtremeCraft", "sl.extremecraft.net"),
    ("Twenture", "sl.twenture.net"),
    ("Twerion", "hey.twerion.net"),
    ("SpiderSMP", "spidersmp.ddns.net"),
];

const TEXTURE_PACKS: &[&str] = &["fixes.zip", "fullbright.zip", "redstone.zip", "variation.zip"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TexturePackSpec {
    pub archive_name: String,
    pub source_location: String,
}

/// What the synchronizer pushes into the game directory.
#[derive(Clone, Debug)]
pub struct AssetCatalog {
    pub settings_url: String,
    pub servers: Vec<ServerEntry>,
    pub texture_packs: Vec<TexturePackSpec>,
}

impl AssetCatalog {
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            settings_url: config.settings_url(),
            servers: SERVERS
                .iter()
                .map(|(name, ip)| ServerEntry::new(*name, *ip))
                .collect(),
            texture_packs: TEXTURE_PACKS
                .iter()
                .map(|name| TexturePackSpec {
                    archive_name: (*name).to_owned(),
                    source_location: config.remote_url(name),
                })
                .collect(),
        }
    }
}

/// Result of one sub-operation: a short detail on success, the error text otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Ok(String),
    Failed(String),
}

impl Outcome {
    fn from_result(result: Result<String, SyncError>) -> Self {
        match result {
            Ok(detail) => Outcome::Ok(detail),
            Err(err) => Outcome::Failed(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PackOutcome {
    pub archive_name: String,
    pub outcome: Outcome,
}

/// Per-item results of a synchronization pass.
#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub settings: Outcome,
    pub servers: Outcome,
    pub texture_packs: Vec<PackOutcome>,
    pub timestamp: String,
}

impl SyncReport {
    pub fn packs_ok(&self) -> usize {
        self.texture_packs
            .iter()
            .filter(|p| p.outcome.is_ok())
            .count()
    }

    /// True when at least one item landed; partial success counts.
    pub fn succeeded(&self) -> bool {
        self.settings.is_ok() || self.servers.is_ok() || self.packs_ok() > 0
    }

    pub fn is_complete(&self) -> bool {
        self.settings.is_ok() && self.servers.is_ok() && self.packs_ok() == self.texture_packs.len()
    }
}

/// Pushes settings, the server list and texture packs into a game directory.
pub struct AssetSync<T: Fetch> {
    game_dir: GameDirectory,
    transport: T,
    catalog: AssetCatalog,
    log: StatusLog,
}

impl<T: Fetch> AssetSync<T> {
    pub fn new(game_dir: GameDirectory, transport: T, catalog: AssetCatalog, log: StatusLog) -> Self {
        Self {
            game_dir,
            transport,
            catalog,
            log,
        }
    }

    pub async fn sync_all(&self) -> SyncReport {
        self.log.info(format!("importing assets into {}", self.game_dir.path().display()));
        let settings = Outcome::from_result(self.sync_settings().await);
        let servers = Outcome::from_result(self.sync_servers().await.map(|n| format!("{n} servers")));
        let texture_packs = self.sync_texture_packs().await;

        let report = SyncReport {
            settings,
            servers,
            texture_packs,
            timestamp: Utc::now().to_rfc3339(),
        };
        self.log.info(format!(
            "asset import completed ({} of {} texture packs)",
            report.packs_ok(),
            report.texture_packs.len()
        ));
        report
    }

    /// Download the settings document and overwrite `options.txt` with it.
    pub async fn sync_settings(&self) -> Result<String, SyncError> {
        let result = async {
            let bytes = self.transport.fetch(&self.catalog.settings_url).await?;
            self.game_dir.write(SETTINGS_FILE, &bytes).await?;
            Ok::<_, SyncError>(format!("{} bytes", bytes.len()))
        }
        .await;
        match &result {
            Ok(_) => self.log.info("downloaded game settings"),
            Err(err) => self.log.warn(format!("settings: {err}")),
        }
        result
    }

    /// Replace `servers.dat` with the built-in catalog. Returns how many servers were written.
    pub async fn sync_servers(&self) -> Result<usize, SyncError> {
        let result = async {
            let bytes = servers::encode(&self.catalog.servers)?;
            self.game_dir.write(SERVERS_FILE, &bytes).await?;
            Ok::<_, SyncError>(self.catalog.servers.len())
        }
        .await;
        match &result {
            Ok(count) => self.log.info(format!("imported {count} servers")),
            Err(err) => self.log.warn(format!("servers: {err}")),
        }
        result
    }

    /// Fetch and unpack every texture pack; a failing pack never stops the others.
    pub async fn sync_texture_packs(&self) -> Vec<PackOutcome> {
        let packs_dir = match self.game_dir.subdir(RESOURCE_PACKS_DIR).await {
            Ok(dir) => dir,
            Err(err) => {
                self.log.warn(format!("texture packs: {err}"));
                return self
                    .catalog
                    .texture_packs
                    .iter()
                    .map(|pack| PackOutcome {
                        archive_name: pack.archive_name.clone(),
                        outcome: Outcome::Failed(err.to_string()),
                    })
                    .collect();
            }
        };

        let mut outcomes = Vec::with_capacity(self.catalog.texture_packs.len());
        for pack in &self.catalog.texture_packs {
            let result = self.sync_pack(pack, &packs_dir).await;
            if let Err(err) = &result {
                self.log.warn(format!("{}: {err}", pack.archive_name));
            }
            outcomes.push(PackOutcome {
                archive_name: pack.archive_name.clone(),
                outcome: Outcome::from_result(result),
            });
        }
        let ok = outcomes.iter().filter(|p| p.outcome.is_ok()).count();
        self.log.info(format!("processed {ok}/{} texture packs", outcomes.len()));
        outcomes
    }

    async fn sync_pack(&self, pack: &TexturePackSpec, packs_dir: &Path) -> Result<String, SyncError> {
        let bytes = self.transport.fetch(&pack.source_location).await?;
        let archive_path = confined_join(packs_dir, &pack.archive_name)?;
        fs::write(&archive_path, &bytes)
            .await
            .map_err(|e| SyncError::write(&archive_path, e))?;
        self.log.debug(format!("saved {}", archive_path.display()));

        let folder = archive::pack_folder_name(&pack.archive_name);
        let target = confined_join(packs_dir, &folder)?;
        let summary = archive::extract(&bytes, &target, &self.log.child("archive"))?;
        self.log.debug(format!(
            "{folder}: {} files, {} directories, root {}",
            summary.files,
            summary.directories,
            summary.stripped_root.as_deref().unwrap_or("kept")
        ));

        if let Err(err) = fs::remove_file(&archive_path).await {
            self.log.warn(format!("could not remove {}: {err}", archive_path.display()));
        }
        self.log.info(format!("installed texture pack {folder} ({} files)", summary.files));
        Ok(format!("{} files", summary.files))
    }
}

/// Human-readable summary of a synchronization pass.
pub fn format_report(report: &SyncReport) -> String {
    let mut output = String::new();
    let line = |outcome: &Outcome| match outcome {
        Outcome::Ok(detail) => format!("OK ({detail})"),
        Outcome::Failed(reason) => format!("FAILED ({reason})"),
    };

    let _ = writeln!(
        &mut output,
        "Assets: {}/{} texture packs, {}",
        report.packs_ok(),
        report.texture_packs.len(),
        if report.is_complete() { "complete" } else { "partial" }
    );
    let _ = writeln!(&mut output, "Settings: {}", line(&report.settings));
    let _ = writeln!(&mut output, "Servers: {}", line(&report.servers));
    for pack in &report.texture_packs {
        let _ = writeln!(&mut output, "Pack {}: {}", pack.archive_name, line(&pack.outcome));
    }
    output
}
