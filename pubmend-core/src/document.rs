//! Where the manifest text comes from and goes back to

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Manifest file names, in lookup order
pub const MANIFEST_NAMES: [&str; 2] = ["pubspec.yaml", "pubspec.yml"];

/// A readable and replaceable manifest
pub trait DocumentSource: Send {
    /// Current full text
    fn read(&self) -> Result<String>;

    /// Replace the full text in one write
    fn replace(&mut self, text: &str) -> Result<()>;

    fn ends_with_newline(&self) -> Result<bool> {
        Ok(self.read()?.ends_with('\n'))
    }

    /// Human-readable location for messages
    fn describe(&self) -> String;
}

/// A manifest on disk
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Find the manifest in a project directory
    pub fn discover(dir: &Path) -> Result<Self> {
        MANIFEST_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .map(Self::new)
            .ok_or_else(|| Error::ManifestNotFound {
                path: dir.join(MANIFEST_NAMES[0]),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for ManifestFile {
    fn read(&self) -> Result<String> {
        debug!("Reading {}", self.path.display());
        std::fs::read_to_string(&self.path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => Error::ManifestNotFound {
                path: self.path.clone(),
            },
            _ => Error::Io {
                path: self.path.clone(),
                source,
            },
        })
    }

    fn replace(&mut self, text: &str) -> Result<()> {
        std::fs::write(&self.path, text).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        info!("Updated {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A manifest held in memory, e.g. an editor buffer
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    text: String,
    writes: usize,
}

impl InMemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            writes: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of times the text was replaced
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DocumentSource for InMemoryDocument {
    fn read(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn replace(&mut self, text: &str) -> Result<()> {
        self.text = text.to_string();
        self.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "<in-memory pubspec>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_prefers_yaml() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("pubspec.yml"), "name: b\n").unwrap();
        std::fs::write(temp_dir.path().join("pubspec.yaml"), "name: a\n").unwrap();

        let file = ManifestFile::discover(temp_dir.path()).unwrap();
        assert_eq!(file.path(), temp_dir.path().join("pubspec.yaml"));
    }

    #[test]
    fn test_discover_falls_back_to_yml() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("pubspec.yml"), "name: b\n").unwrap();

        let file = ManifestFile::discover(temp_dir.path()).unwrap();
        assert_eq!(file.read().unwrap(), "name: b\n");
    }

    #[test]
    fn test_discover_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = ManifestFile::discover(temp_dir.path()).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound { .. }));
        assert!(err.to_string().contains("pubspec.yaml"));
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = ManifestFile::new(temp_dir.path().join("pubspec.yaml"));
        assert!(matches!(
            file.read().unwrap_err(),
            Error::ManifestNotFound { .. }
        ));
    }

    #[test]
    fn test_replace_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pubspec.yaml");
        std::fs::write(&path, "name: app").unwrap();

        let mut file = ManifestFile::new(&path);
        assert!(!file.ends_with_newline().unwrap());

        file.replace("name: app\n").unwrap();
        assert!(file.ends_with_newline().unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "name: app\n");
    }

    #[test]
    fn test_in_memory_counts_writes() {
        let mut doc = InMemoryDocument::new("name: app\n");
        assert_eq!(doc.writes(), 0);
        doc.replace("name: other\n").unwrap();
        assert_eq!(doc.text(), "name: other\n");
        assert_eq!(doc.writes(), 1);
    }
}
