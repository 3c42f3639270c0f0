use serde::Serialize;

use crate::assets::SyncReport;
use crate::updater::UpdateReport;

// What a front-end needs to know while the engine works in the background.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum AppState {
    Idle,
    CheckingForUpdates,
    Updating {
        file: String,
        progress: f32,
    },
    Updated(UpdateReport),
    ReadyToLaunch {
        version: String,
    },
    SyncingAssets,
    AssetsSynced(SyncReport),
    Error(String),
}

// Requests coming from the front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    CheckForUpdates,
    SyncAssets,
}
