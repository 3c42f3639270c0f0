use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const DEFAULT_REMOTE_BASE: &str = "https://github.com/Qsenja/Quarzismclient/raw/refs/heads/main";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Launcher settings read from `launcher.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub remote_base: String,
    pub request_timeout_secs: u64,
    pub install_dir: Option<PathBuf>,
    pub game_dir: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            remote_base: DEFAULT_REMOTE_BASE.to_owned(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            install_dir: None,
            game_dir: None,
        }
    }
}

impl LauncherConfig {
    /// Load the config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(SyncError::Config(format!(
                    "unable to read {}: {err}",
                    path.display()
                )));
            }
        };
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config.normalized())
    }

    /// Like [`LauncherConfig::load`], but a broken file is reported and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            log::warn!(
                "config: ignoring {} and using defaults ({err})",
                path.display()
            );
            Self::default()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn remote_url(&self, file: &str) -> String {
        format!("{}/{file}", self.remote_base)
    }

    pub fn version_url(&self) -> String {
        self.remote_url("version.txt")
    }

    pub fn manifest_url(&self) -> String {
        self.remote_url("source.txt")
    }

    pub fn settings_url(&self) -> String {
        self.remote_url("options.txt")
    }

    fn normalized(mut self) -> Self {
        let trimmed = self.remote_base.trim().trim_end_matches('/');
        self.remote_base = if trimmed.is_empty() {
            DEFAULT_REMOTE_BASE.to_owned()
        } else {
            trimmed.to_owned()
        };
        self
    }
}
