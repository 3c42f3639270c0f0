use std::env;
use std::fs;
use std::path::PathBuf;

/// Returns the root directory used by the launcher.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("quarzism-launcher")
}

/// Where the self-updating launcher code and its `version.txt` live.
pub fn install_dir() -> PathBuf {
    default_app_dir().join("scripts")
}

pub fn backup_dir() -> PathBuf {
    default_app_dir().join("backup")
}

pub fn game_dir() -> PathBuf {
    default_app_dir().join("game").join(".minecraft")
}

pub fn config_path() -> PathBuf {
    default_app_dir().join("launcher.json")
}

/// Create the launcher root; the install and game directories are created on first write.
pub fn ensure_app_dir() -> std::io::Result<PathBuf> {
    let root = default_app_dir();
    fs::create_dir_all(&root)?;
    Ok(root)
}
