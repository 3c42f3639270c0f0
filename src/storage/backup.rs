use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use tokio::fs;

use super::confined_join;
use crate::error::SyncError;

/// Copies of files taken before an update pass, keyed by logical name.
///
/// Each pass saves into its own fresh directory under the backup root. Discarding
/// removes only that directory, plus the root when this set created it and it is
/// left empty; anything else living in the root is never touched.
#[derive(Debug)]
pub struct BackupSet {
    root: PathBuf,
    created_root: bool,
    dir: PathBuf,
    saved: HashMap<String, PathBuf>,
}

impl BackupSet {
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let root = root.into();
        let created_root = !fs::try_exists(&root).await.unwrap_or(false);
        fs::create_dir_all(&root)
            .await
            .map_err(|e| SyncError::write(&root, e))?;

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let dir = root.join(format!(".update-backup-{stamp}-{}", process::id()));
        // `create_dir` fails on an existing path, so the pass never adopts a foreign directory.
        fs::create_dir(&dir)
            .await
            .map_err(|e| SyncError::write(&dir, e))?;
        Ok(Self {
            root,
            created_root,
            dir,
            saved: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Save a copy of `source` under `name`. Returns `false` when there was nothing to save.
    pub async fn capture(&mut self, name: &str, source: &Path) -> Result<bool, SyncError> {
        if !fs::try_exists(source).await.unwrap_or(false) {
            return Ok(false);
        }
        let copy = confined_join(&self.dir, name)?;
        if let Some(parent) = copy.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::write(parent, e))?;
        }
        fs::copy(source, &copy)
            .await
            .map_err(|e| SyncError::write(&copy, e))?;
        self.saved.insert(name.to_owned(), copy);
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.saved.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.saved.len()
    }

    /// Put the saved copy of `name` back at `dest`. Returns `false` when no copy exists.
    pub async fn restore(&self, name: &str, dest: &Path) -> Result<bool, SyncError> {
        let Some(copy) = self.saved.get(name) else {
            return Ok(false);
        };
        fs::copy(copy, dest)
            .await
            .map_err(|e| SyncError::BackupRestore {
                name: name.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(true)
    }

    pub async fn discard(self) -> Result<(), SyncError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::write(&self.dir, e)),
        }
        if self.created_root {
            // Only succeeds while empty; a root that gained other content stays.
            let _ = fs::remove_dir(&self.root).await;
        }
        Ok(())
    }
}
