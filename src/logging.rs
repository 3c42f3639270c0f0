use std::fmt::Display;
use std::sync::{Arc, Mutex};

use env_logger::Env;
use log::Level;

/// Install the process logger. `RUST_LOG` still wins over the default filter.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
}

/// Scoped logging handle handed to each component when it is built.
///
/// The scope doubles as the `log` target, so `RUST_LOG=launcher::updater=debug` narrows output
/// to one component. A capturing handle also keeps the status lines it emitted at
/// `info` and above, which is what callers surface to the user.
#[derive(Clone, Debug)]
pub struct StatusLog {
    scope: String,
    captured: Option<Arc<Mutex<Vec<String>>>>,
}

impl StatusLog {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            captured: None,
        }
    }

    pub fn capturing(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            captured: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Derive a handle for a sub-component that shares this handle's capture buffer.
    pub fn child(&self, scope: &str) -> Self {
        Self {
            scope: format!("{}::{scope}", self.scope),
            captured: self.captured.clone(),
        }
    }

    pub fn debug(&self, message: impl Display) {
        self.emit(Level::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.emit(Level::Error, message);
    }

    /// Status lines captured so far; empty for a non-capturing handle.
    pub fn lines(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .and_then(|buf| buf.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    fn emit(&self, level: Level, message: impl Display) {
        let line = message.to_string();
        log::log!(target: self.scope.as_str(), level, "{line}");
        if level <= Level::Info
            && let Some(buf) = &self.captured
            && let Ok(mut lines) = buf.lock()
        {
            lines.push(format!("[{}] {line}", level.as_str().to_lowercase()));
        }
    }
}
