use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::error::SyncError;

pub mod backup;

pub use backup::BackupSet;

const VERSION_FILE: &str = "version.txt";
/// Version assumed when no readable marker exists; never equal to a real release token.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Join a relative logical name onto `base`, refusing anything that could land outside it.
pub fn confined_join(base: &Path, relative: &str) -> Result<PathBuf, SyncError> {
    let rel = Path::new(relative);
    if relative.trim().is_empty() {
        return Err(SyncError::UnsafePath(relative.to_owned()));
    }
    let mut out = base.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SyncError::UnsafePath(relative.to_owned()));
            }
        }
    }
    if out == base {
        return Err(SyncError::UnsafePath(relative.to_owned()));
    }
    Ok(out)
}

/// Capability handle for the game installation; every asset write goes through it.
#[derive(Clone, Debug)]
pub struct GameDirectory {
    root: PathBuf,
}

impl GameDirectory {
    /// Handle for the game directory at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SyncError> {
        confined_join(&self.root, relative)
    }

    /// Write `bytes` to `relative`, replacing whatever was there.
    pub async fn write(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf, SyncError> {
        let path = self.resolve(relative)?;
        write_file(&path, bytes).await?;
        Ok(path)
    }

    /// Create (if needed) and return a subdirectory.
    pub async fn subdir(&self, relative: &str) -> Result<PathBuf, SyncError> {
        let path = self.resolve(relative)?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| SyncError::write(&path, e))?;
        Ok(path)
    }
}

/// Files owned by the updater: the installed code and its version marker.
#[derive(Clone, Debug)]
pub struct StorageManager {
    install_dir: PathBuf,
    backup_dir: PathBuf,
}

impl StorageManager {
    pub fn new(install_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn target_path(&self, logical_name: &str) -> Result<PathBuf, SyncError> {
        confined_join(&self.install_dir, logical_name)
    }

    /// Read the local version marker, if there is a usable one.
    pub async fn read_local_version(&self) -> Option<String> {
        let path = self.install_dir.join(VERSION_FILE);
        fs::read(&path).await.ok().and_then(|bytes| {
            let version = String::from_utf8_lossy(&bytes).trim().to_owned();
            (!version.is_empty()).then_some(version)
        })
    }

    pub async fn write_local_version(&self, version: &str) -> Result<(), SyncError> {
        let path = self.install_dir.join(VERSION_FILE);
        write_file(&path, version.as_bytes()).await
    }

    pub async fn write_target(&self, logical_name: &str, bytes: &[u8]) -> Result<PathBuf, SyncError> {
        let path = self.target_path(logical_name)?;
        write_file(&path, bytes).await?;
        Ok(path)
    }
}

pub(crate) async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::write(parent, e))?;
    }
    fs::write(path, bytes)
        .await
        .map_err(|e| SyncError::write(path, e))
}
