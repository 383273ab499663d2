//! JSON state file.
//!
//! One document holds the whole [`BotState`]. Writes go to a temp file that
//! is fsynced and renamed over the target, so a crash leaves either the old
//! or the new document on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::state::BotState;
use crate::error::{Error, Result};
use crate::port::outbound::store::StateRepository;

/// Current state document version.
pub const STATE_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    state: &'a BotState,
}

#[derive(Deserialize)]
struct Header {
    version: u32,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    state: BotState,
}

/// [`StateRepository`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateRepository for JsonStateFile {
    fn load(&self) -> Result<Option<BotState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let header: Header = serde_json::from_str(&content).map_err(|e| {
            Error::Persistence(format!("corrupt state file {}: {e}", self.path.display()))
        })?;
        if header.version != STATE_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported state version {} in {} (expected {STATE_VERSION})",
                header.version,
                self.path.display()
            )));
        }

        let document: Document = serde_json::from_str(&content).map_err(|e| {
            Error::Persistence(format!("corrupt state file {}: {e}", self.path.display()))
        })?;
        debug!(
            path = %self.path.display(),
            saved_at = ?document.saved_at,
            "State file loaded"
        );
        Ok(Some(document.state))
    }

    fn save(&self, state: &BotState) -> Result<()> {
        let json = serde_json::to_vec_pretty(&DocumentRef {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            state,
        })?;

        let persist = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let temp_path = self.temp_path();
            let mut file = fs::File::create(&temp_path)?;

            let cleanup_and_err = |e| {
                let _ = fs::remove_file(&temp_path);
                e
            };

            file.write_all(&json).map_err(cleanup_and_err)?;
            file.sync_all().map_err(cleanup_and_err)?;
            fs::rename(&temp_path, &self.path).map_err(cleanup_and_err)?;
            Ok(())
        };

        persist().map_err(|e| {
            Error::Persistence(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
