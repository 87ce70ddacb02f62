//! Session persistence utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::model::SourceBundle;

const SESSION_DIR: &str = ".webweaver";
const SESSION_FILE: &str = "session.json";

/// Fragments persisted between invocations.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub bundle: SourceBundle,
    /// RFC 3339 timestamp of the last save.
    pub saved_at: Option<String>,
}

/// Persists the editing session to a file under `.webweaver/`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    path: PathBuf,
}

impl SessionStore {
    /// Create a new store rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let path = root.join(SESSION_DIR).join(SESSION_FILE);
        Self { root, path }
    }

    /// Location of the persisted session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the most recently persisted session snapshot.
    pub fn load(&self) -> Result<Option<SessionSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file at {}", self.path.display()))?;
        let snapshot = serde_json::from_str(&data)
            .with_context(|| format!("invalid session data in {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Load the persisted bundle, or the starter bundle when nothing was saved yet.
    pub fn load_bundle_or_starter(&self) -> Result<SourceBundle> {
        Ok(self
            .load()?
            .map(|snapshot| snapshot.bundle)
            .unwrap_or_else(SourceBundle::starter))
    }

    /// Persist the bundle, stamping the save time and creating parent directories as needed.
    pub fn save(&self, bundle: &SourceBundle) -> Result<SessionSnapshot> {
        let dir = self.path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create session directory {}", dir.display()))?;

        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("failed to format session timestamp")?;
        let snapshot = SessionSnapshot {
            bundle: bundle.clone(),
            saved_at: Some(saved_at),
        };

        let data = serde_json::to_string_pretty(&snapshot)
            .context("failed to serialize session snapshot")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write session file to {}", self.path.display()))?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_session_loads_starter() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = SessionStore::new(temp.path());
        assert_eq!(store.load()?, None);
        assert_eq!(store.load_bundle_or_starter()?, SourceBundle::starter());
        Ok(())
    }

    #[test]
    fn save_then_load_restores_bundle() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = SessionStore::new(temp.path());
        let bundle = SourceBundle::new("<p>kept</p>", "", "console.log(1)");

        let saved = store.save(&bundle)?;
        assert!(saved.saved_at.is_some());
        assert!(store.path().starts_with(temp.path()));

        let loaded = store.load()?.expect("snapshot present");
        assert_eq!(loaded.bundle, bundle);
        assert_eq!(loaded, saved);
        Ok(())
    }

    #[test]
    fn corrupt_session_is_an_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = SessionStore::new(temp.path());
        fs::create_dir_all(store.path().parent().unwrap())?;
        fs::write(store.path(), "{ not json")?;
        assert!(store.load().is_err());
        Ok(())
    }
}
