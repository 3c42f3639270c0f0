use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Component, Path};

use serde::Serialize;
use zip::read::ZipArchive;

use crate::error::SyncError;
use crate::logging::StatusLog;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    /// Top-level folder that was flattened away, if the archive had one.
    pub stripped_root: Option<String>,
}

/// Extract a zip held in memory into `destination`.
pub fn extract(archive: &[u8], destination: &Path, log: &StatusLog) -> Result<ExtractSummary, SyncError> {
    extract_reader(Cursor::new(archive), destination, log)
}

/// Extract a zip into `destination`, flattening a single redundant root folder.
///
/// When every entry sits under the same top-level folder (`pack/…`), that folder is
/// dropped so the destination holds the pack's content directly; otherwise paths
/// are kept as they are. Entries whose names would escape `destination` are skipped.
pub fn extract_reader<R: Read + Seek>(
    reader: R,
    destination: &Path,
    log: &StatusLog,
) -> Result<ExtractSummary, SyncError> {
    let mut archive = ZipArchive::new(reader)?;

    let mut paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let path = entry.enclosed_name();
        if path.is_none() {
            log.warn(format!("archive: skipping unsafe entry {:?}", entry.name()));
        }
        paths.push(path.map(|p| (p, entry.is_dir())));
    }

    let stripped_root = common_root(paths.iter().flatten().map(|(p, is_dir)| (p.as_path(), *is_dir)));
    if let Some(root) = &stripped_root {
        log.debug(format!("archive: flattening root folder {root:?}"));
    }

    fs::create_dir_all(destination).map_err(|e| SyncError::write(destination, e))?;
    let mut summary = ExtractSummary {
        stripped_root: stripped_root.clone(),
        ..Default::default()
    };
    for (i, path) in paths.into_iter().enumerate() {
        let Some((path, is_dir)) = path else { continue };
        let relative = match &stripped_root {
            Some(root) => match path.strip_prefix(root) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => path,
            },
            None => path,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let out_path = destination.join(&relative);

        if is_dir {
            fs::create_dir_all(&out_path).map_err(|e| SyncError::write(&out_path, e))?;
            summary.directories += 1;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::write(parent, e))?;
        }
        let mut entry = archive.by_index(i)?;
        let mut out_file = fs::File::create(&out_path).map_err(|e| SyncError::write(&out_path, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| {
            SyncError::Extraction(format!("failed to inflate {}: {e}", relative.display()))
        })?;
        summary.files += 1;
    }
    Ok(summary)
}

/// The single top-level folder shared by every entry, if there is one.
fn common_root<'a>(entries: impl Iterator<Item = (&'a Path, bool)>) -> Option<String> {
    let mut roots = BTreeSet::new();
    let mut any = false;
    for (path, is_dir) in entries {
        any = true;
        let mut components = path.components();
        let first = match components.next() {
            Some(Component::Normal(first)) => first.to_string_lossy().into_owned(),
            _ => return None,
        };
        // A file sitting at the top level means there is no wrapper folder.
        if components.next().is_none() && !is_dir {
            return None;
        }
        roots.insert(first);
        if roots.len() > 1 {
            return None;
        }
    }
    if !any {
        return None;
    }
    roots.into_iter().next()
}

/// Default extraction target for a pack archive: its file name without extension.
pub fn pack_folder_name(archive_name: &str) -> String {
    Path::new(archive_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive_name.to_owned())
}
