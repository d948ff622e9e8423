//! Byte sources the validators and reader consume.
//!
//! The caller owns the underlying resource; every `open()` hands out a fresh
//! reader that is dropped on all exit paths.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// An openable, sized stream of archive bytes.
pub trait ByteSource {
    /// Total size in bytes as reported by the source.
    fn len(&self) -> io::Result<u64>;

    /// Open a fresh reader positioned at offset 0.
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Human-facing filename, if the source exposes one.
    fn display_name(&self) -> Option<String> {
        None
    }

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// An archive on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn display_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// An archive already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
    name: Option<String>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> io::Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }

    fn display_name(&self) -> Option<String> {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new(b"PXPL".to_vec()).with_name("backup.pxpl");
        assert_eq!(source.len().unwrap(), 4);
        assert_eq!(source.display_name().as_deref(), Some("backup.pxpl"));

        let mut buf = Vec::new();
        source.open().unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"PXPL");
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        File::create(&path).unwrap().write_all(b"{}").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.len().unwrap(), 2);
        assert!(!source.is_empty().unwrap());
        assert_eq!(source.display_name().as_deref(), Some("old.json"));
    }

    #[test]
    fn test_missing_file_errors() {
        let source = FileSource::new("/definitely/not/here.pxpl");
        assert!(source.len().is_err());
        assert!(source.open().is_err());
    }
}
