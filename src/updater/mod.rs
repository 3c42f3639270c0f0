use std::fmt::{self, Write as _};
use std::future::Future;

use chrono::Utc;
use serde::Serialize;

use crate::error::SyncError;
use crate::logging::StatusLog;
use crate::manifest::{self, ManifestEntry};
use crate::networking::Fetch;
use crate::storage::{BackupSet, StorageManager, UNKNOWN_VERSION};
use crate::util::progress_percent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UpdateState {
    Checking,
    UpToDate,
    Updating,
    Committed,
    Failed,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateState::Checking => "checking",
            UpdateState::UpToDate => "up to date",
            UpdateState::Updating => "updating",
            UpdateState::Committed => "committed",
            UpdateState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Where the updater looks for the remote version and file list.
#[derive(Clone, Debug)]
pub struct UpdaterConfig {
    pub version_url: String,
    pub manifest_url: String,
    /// Used when the manifest cannot be fetched. Empty means "no fallback".
    pub fallback: Vec<ManifestEntry>,
}

#[derive(Clone, Debug)]
pub struct ProgressUpdate {
    pub stage: &'static str,
    pub progress: f32,
    pub current_file: Option<String>,
}

pub type ProgressCallback<'a> = Option<&'a mut (dyn FnMut(ProgressUpdate) + Send)>;

fn emit_progress(cb: &mut ProgressCallback<'_>, update: ProgressUpdate) {
    if let Some(callback) = cb.as_deref_mut() {
        callback(update);
    }
}

/// Outcome of one update pass.
#[derive(Clone, Debug, Serialize)]
pub struct UpdateReport {
    pub state: UpdateState,
    pub local_version: String,
    pub remote_version: Option<String>,
    pub updated: Vec<String>,
    pub restored: Vec<String>,
    pub failed: Vec<String>,
    pub used_fallback_manifest: bool,
    pub marker_written: bool,
    pub timestamp: String,
}

impl UpdateReport {
    fn new(local_version: String) -> Self {
        Self {
            state: UpdateState::Checking,
            local_version,
            remote_version: None,
            updated: Vec::new(),
            restored: Vec::new(),
            failed: Vec::new(),
            used_fallback_manifest: false,
            marker_written: false,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Anything but `Failed` lets the launcher continue.
    pub fn succeeded(&self) -> bool {
        self.state != UpdateState::Failed
    }
}

/// Brings the launcher's own files in line with the remote source.
pub struct Updater<T: Fetch> {
    transport: T,
    storage: StorageManager,
    config: UpdaterConfig,
    log: StatusLog,
}

impl<T: Fetch> Updater<T> {
    pub fn new(transport: T, storage: StorageManager, config: UpdaterConfig, log: StatusLog) -> Self {
        Self {
            transport,
            storage,
            config,
            log,
        }
    }

    /// Run a pass, then hand the report to `proceed` whatever the outcome.
    ///
    /// This is the point where the freshly updated program takes over; the launcher
    /// never re-executes itself.
    pub async fn run_then<F, Fut>(&self, progress: ProgressCallback<'_>, proceed: F) -> Fut::Output
    where
        F: FnOnce(UpdateReport) -> Fut,
        Fut: Future,
    {
        let report = self.run_with_progress(progress).await;
        self.log.debug(format!("handing off after update ({})", report.state));
        proceed(report).await
    }

    pub async fn run_with_progress(&self, mut progress: ProgressCallback<'_>) -> UpdateReport {
        let local = self
            .storage
            .read_local_version()
            .await
            .unwrap_or_else(|| UNKNOWN_VERSION.to_owned());
        let mut report = UpdateReport::new(local.clone());
        self.log.info(format!(
            "checking for updates in {} (local version {local})",
            self.storage.install_dir().display()
        ));
        emit_progress(
            &mut progress,
            ProgressUpdate {
                stage: "check",
                progress: 0.0,
                current_file: None,
            },
        );

        let remote = match self.remote_version().await {
            Ok(remote) => remote,
            Err(err) => {
                // An unreachable version endpoint never blocks launching.
                self.log.warn(format!("version check failed, assuming up to date: {err}"));
                local.clone()
            }
        };
        report.remote_version = Some(remote.clone());

        if remote == local {
            self.log.info(format!("launcher is up to date ({local})"));
            report.state = UpdateState::UpToDate;
            return report;
        }

        report.state = UpdateState::Updating;
        self.log.info(format!("updating from {local} to {remote}"));

        let entries = match manifest::fetch_manifest(&self.transport, &self.config.manifest_url, &self.log).await {
            Ok(entries) => entries,
            Err(err) if !self.config.fallback.is_empty() => {
                self.log.warn(format!("{err}; using built-in file list"));
                report.used_fallback_manifest = true;
                self.config.fallback.clone()
            }
            Err(err) => {
                self.log.error(format!("{err}; no fallback file list, aborting update"));
                report.state = UpdateState::Failed;
                return report;
            }
        };

        let backup = self.backup_existing(&entries).await;
        self.replace_files(&entries, backup.as_ref(), &mut report, &mut progress).await;

        match self.storage.write_local_version(&remote).await {
            Ok(()) => report.marker_written = true,
            Err(err) => self.log.warn(format!("could not record version {remote}: {err}")),
        }

        if let Some(backup) = backup
            && let Err(err) = backup.discard().await
        {
            self.log.warn(format!("could not remove backup directory: {err}"));
        }

        report.state = UpdateState::Committed;
        emit_progress(
            &mut progress,
            ProgressUpdate {
                stage: "commit",
                progress: 100.0,
                current_file: None,
            },
        );
        self.log.info(format!(
            "update to {remote} finished: {} updated, {} restored, {} failed",
            report.updated.len(),
            report.restored.len(),
            report.failed.len()
        ));
        report
    }

    async fn remote_version(&self) -> Result<String, SyncError> {
        let bytes = self.transport.fetch(&self.config.version_url).await?;
        let version = String::from_utf8_lossy(&bytes).trim().to_owned();
        if version.is_empty() {
            return Err(SyncError::network(&self.config.version_url, "empty version document"));
        }
        Ok(version)
    }

    async fn backup_existing(&self, entries: &[ManifestEntry]) -> Option<BackupSet> {
        let mut backup = match BackupSet::create(self.storage.backup_dir()).await {
            Ok(backup) => backup,
            Err(err) => {
                self.log.warn(format!("backups disabled for this pass: {err}"));
                return None;
            }
        };
        for entry in entries {
            let Ok(target) = self.storage.target_path(&entry.logical_name) else {
                continue;
            };
            if let Err(err) = backup.capture(&entry.logical_name, &target).await {
                self.log.warn(format!("could not back up {}: {err}", entry.logical_name));
            }
        }
        self.log.debug(format!(
            "backed up {} existing files into {}",
            backup.len(),
            backup.path().display()
        ));
        Some(backup)
    }

    async fn replace_files(
        &self,
        entries: &[ManifestEntry],
        backup: Option<&BackupSet>,
        report: &mut UpdateReport,
        progress: &mut ProgressCallback<'_>,
    ) {
        let total = entries.len() as u64;
        for (index, entry) in entries.iter().enumerate() {
            let name = &entry.logical_name;
            emit_progress(
                progress,
                ProgressUpdate {
                    stage: "download",
                    progress: progress_percent(index as u64, Some(total)),
                    current_file: Some(name.clone()),
                },
            );

            let result = match self.transport.fetch(&entry.source_location).await {
                Ok(bytes) => self.storage.write_target(name, &bytes).await.map(|_| ()),
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => {
                    self.log.info(format!("downloaded {name}"));
                    report.updated.push(name.clone());
                }
                Err(err) => {
                    self.log.warn(format!("failed to update {name}: {err}"));
                    report.failed.push(name.clone());
                    if let Some(backup) = backup.filter(|b| b.contains(name)) {
                        self.restore(backup, name, report).await;
                    }
                }
            }
        }
    }

    async fn restore(&self, backup: &BackupSet, name: &str, report: &mut UpdateReport) {
        let Ok(target) = self.storage.target_path(name) else {
            return;
        };
        match backup.restore(name, &target).await {
            Ok(true) => {
                self.log.info(format!("restored {name} from backup"));
                report.restored.push(name.to_owned());
            }
            Ok(false) => {}
            Err(err) => self.log.error(err),
        }
    }
}

/// Human-readable summary of an update pass.
pub fn format_report(report: &UpdateReport) -> String {
    let mut output = String::new();
    let list = |names: &[String]| {
        if names.is_empty() {
            "-".to_owned()
        } else {
            names.join(", ")
        }
    };

    let _ = writeln!(&mut output, "Update: {}", report.state);
    let _ = writeln!(
        &mut output,
        "Version: {} -> {}",
        report.local_version,
        report.remote_version.as_deref().unwrap_or(UNKNOWN_VERSION)
    );
    if report.state == UpdateState::UpToDate {
        return output;
    }
    if report.used_fallback_manifest {
        let _ = writeln!(&mut output, "File list: built-in fallback");
    }
    let _ = writeln!(&mut output, "Updated: {}", list(&report.updated));
    let _ = writeln!(&mut output, "Failed: {}", list(&report.failed));
    let _ = writeln!(&mut output, "Restored: {}", list(&report.restored));
    output
}
