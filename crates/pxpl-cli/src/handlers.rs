//! Module handlers backed by one `<key>.json` file per module in a directory.

use anyhow::{Context, Result};
use pxpl_backup::archive::module_entry_name;
use pxpl_backup::manifest::count_entries;
use pxpl_backup::{ModuleHandler, ModuleKey};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct DirectoryHandler {
    key: String,
    dir: PathBuf,
}

impl DirectoryHandler {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            dir: dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(module_entry_name(&self.key))
    }

    /// One handler per known module key.
    pub fn all_known(dir: &Path) -> Vec<Box<dyn ModuleHandler>> {
        ModuleKey::ALL
            .iter()
            .map(|key| Box::new(Self::new(dir, key.as_str())) as Box<dyn ModuleHandler>)
            .collect()
    }

    /// Handlers for the known module keys that have a file in `dir`.
    pub fn present_in(dir: &Path) -> Vec<Box<dyn ModuleHandler>> {
        ModuleKey::ALL
            .iter()
            .map(|key| Self::new(dir, key.as_str()))
            .filter(|handler| handler.path().is_file())
            .map(|handler| Box::new(handler) as Box<dyn ModuleHandler>)
            .collect()
    }
}

impl ModuleHandler for DirectoryHandler {
    fn key(&self) -> &str {
        &self.key
    }

    fn export(&self) -> Result<String> {
        let path = self.path();
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))
    }

    /// Writes through a sibling temp file so a failed write never leaves a
    /// truncated module file behind.
    fn import(&self, payload: &str) -> Result<usize> {
        let path = self.path();
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        tmp.write_all(payload.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(count_entries(payload) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_then_export() {
        let dir = tempfile::tempdir().unwrap();
        let handler = DirectoryHandler::new(dir.path(), "favorites");

        let count = handler.import(r#"[{"songId":1},{"songId":2}]"#).unwrap();
        assert_eq!(count, 2);
        assert_eq!(handler.export().unwrap(), r#"[{"songId":1},{"songId":2}]"#);
        assert!(dir.path().join("favorites.json").is_file());
    }

    #[test]
    fn test_present_in_skips_missing_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lyrics.json"), "[]").unwrap();
        std::fs::write(dir.path().join("podcasts.json"), "[]").unwrap();

        let handlers = DirectoryHandler::present_in(dir.path());
        let keys: Vec<&str> = handlers.iter().map(|h| h.key()).collect();
        assert_eq!(keys, vec!["lyrics"]);
    }

    #[test]
    fn test_export_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryHandler::new(dir.path(), "equalizer")
            .export()
            .unwrap_err();
        assert!(err.to_string().contains("equalizer.json"));
    }
}
