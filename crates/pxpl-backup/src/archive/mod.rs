//! Versioned backup container format.
//!
//! A v3 archive is the 4-byte `PXPL` magic followed by a ZIP containing:
//! - `manifest.json`: metadata and per-module checksums (first entry)
//! - `<module_key>.json`: one JSON payload per exported module
//!
//! Older generations (`PXPL` + gzip, bare gzip, raw JSON) are read through
//! [`crate::legacy`] and never written.
//!
//! # Example
//!
//! ```no_run
//! use pxpl_backup::archive::{ArchiveReader, ArchiveWriter};
//! use pxpl_backup::manifest::Manifest;
//! use std::io::Cursor;
//!
//! let mut buffer = Vec::new();
//! let mut writer = ArchiveWriter::new(&mut buffer, Manifest::template("2.4.0", 240, 0));
//! writer.add_module("favorites", r#"[{"songId":7}]"#);
//! writer.finish().unwrap();
//!
//! let manifest = ArchiveReader::new().read_manifest(Cursor::new(&buffer)).unwrap();
//! assert!(manifest.contains_module("favorites"));
//! ```

pub mod reader;
pub mod writer;

use crate::manifest::Manifest;
use std::collections::BTreeMap;

pub use reader::{
    read_all_module_payloads, read_manifest, read_module_payload, ArchiveReader,
};
pub use writer::{write_archive, ArchiveWriter, Progress};

/// Reserved entry name of the manifest inside a v3 container.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Suffix of every module entry.
pub const MODULE_SUFFIX: &str = ".json";

/// A fully decoded archive: manifest plus every module payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveContents {
    pub manifest: Manifest,
    pub modules: BTreeMap<String, String>,
}

/// Entry name a module is stored under.
pub fn module_entry_name(key: &str) -> String {
    format!("{}{}", key, MODULE_SUFFIX)
}

/// Module key for an entry name, or `None` for the manifest and non-JSON entries.
pub fn module_key_for_entry(name: &str) -> Option<&str> {
    if name == MANIFEST_ENTRY {
        return None;
    }
    name.strip_suffix(MODULE_SUFFIX).filter(|key| !key.is_empty())
}
