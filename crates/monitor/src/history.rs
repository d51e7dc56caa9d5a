//! JSON-file history store.
//!
//! The whole mapping is read once at startup and rewritten after every pass.
//! A missing or unreadable file means "start empty", never a fatal error.

use common::{Error, History};
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load history, degrading to an empty mapping on any failure.
    pub fn load(&self) -> History {
        match self.try_load() {
            Ok(history) => {
                info!(
                    "Loaded history for {} products from {}",
                    history.len(),
                    self.path.display()
                );
                history
            }
            Err(e) => {
                warn!("{}; starting with empty history", e);
                History::new()
            }
        }
    }

    /// Strict variant of `load`. A missing file is still `Ok(empty)`.
    pub fn try_load(&self) -> Result<History, Error> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(History::new()),
            Err(e) => {
                return Err(Error::Persist(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            Error::Persist(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Rewrite the whole file. Written to a sibling temp file first and
    /// renamed into place so a crash never leaves a truncated file behind.
    pub fn save(&self, history: &History) -> Result<(), Error> {
        let body = to_pretty_json(history)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.persist_err("create directory", e))?;
            }
        }

        let tmp = self.tmp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&body)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(self.persist_err("write", e));
        }

        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.persist_err("replace", e)
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist_err(&self, action: &str, e: std::io::Error) -> Error {
        Error::Persist(format!("failed to {} {}: {}", action, self.path.display(), e))
    }
}

/// Four-space indented JSON with non-ASCII names kept as-is.
fn to_pretty_json(history: &History) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(history, &mut ser)?;
    Ok(buf)
}
