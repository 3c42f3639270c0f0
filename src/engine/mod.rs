use tokio::sync::mpsc;

use crate::assets::{AssetSync, SyncReport};
use crate::engine::state::{AppState, UserAction};
use crate::logging::StatusLog;
use crate::networking::Fetch;
use crate::updater::{ProgressUpdate, UpdateReport, UpdateState, Updater};

pub mod state;

/// Drives the updater and the asset synchronizer and reports progress as [`AppState`]s.
///
/// Meant to be moved onto a background task; the front-end only sees the channel.
pub struct LauncherEngine<T: Fetch> {
    pub state: AppState,
    updater: Updater<T>,
    assets: AssetSync<T>,
    log: StatusLog,
}

impl<T: Fetch> LauncherEngine<T> {
    pub fn new(updater: Updater<T>, assets: AssetSync<T>, log: StatusLog) -> Self {
        Self {
            state: AppState::Idle,
            updater,
            assets,
            log,
        }
    }

    /// Handle one front-end request. Returns whether it ended with anything succeeding.
    pub async fn handle_action(
        &mut self,
        action: UserAction,
        updates: &mpsc::UnboundedSender<AppState>,
    ) -> bool {
        match action {
            UserAction::CheckForUpdates => {
                self.log.debug("action: CheckForUpdates");
                self.bootstrap(updates).await.succeeded()
            }
            UserAction::SyncAssets => {
                self.log.debug("action: SyncAssets");
                self.sync_assets(updates).await.succeeded()
            }
        }
    }

    /// Run the self-update and hand off to the launch path.
    pub async fn bootstrap(&mut self, updates: &mpsc::UnboundedSender<AppState>) -> UpdateReport {
        self.publish(AppState::CheckingForUpdates, updates);

        let mut progress_cb = |update: ProgressUpdate| {
            if let Some(file) = update.current_file {
                let _ = updates.send(AppState::Updating {
                    file,
                    progress: update.progress,
                });
            }
        };
        let report = self
            .updater
            .run_then(Some(&mut progress_cb), |report| async move { report })
            .await;

        self.publish(AppState::Updated(report.clone()), updates);
        let next = match report.state {
            UpdateState::Failed => {
                AppState::Error("update failed: remote file list unavailable".into())
            }
            _ => AppState::ReadyToLaunch {
                version: report
                    .remote_version
                    .clone()
                    .unwrap_or_else(|| report.local_version.clone()),
            },
        };
        self.publish(next, updates);
        report
    }

    pub async fn sync_assets(&mut self, updates: &mpsc::UnboundedSender<AppState>) -> SyncReport {
        self.publish(AppState::SyncingAssets, updates);
        let report = self.assets.sync_all().await;
        if !report.succeeded() {
            self.log.error("asset import failed: nothing could be installed");
        }
        self.publish(AppState::AssetsSynced(report.clone()), updates);
        self.publish(AppState::Idle, updates);
        report
    }

    fn publish(&mut self, state: AppState, updates: &mpsc::UnboundedSender<AppState>) {
        self.state = state.clone();
        let _ = updates.send(state);
    }
}
