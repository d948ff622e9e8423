//! Deterministic v3 archive writer.
//!
//! Byte-for-byte reproducible for the same template and payloads: entries are
//! written in key order with a fixed timestamp and permissions.

use crate::archive::{module_entry_name, MANIFEST_ENTRY};
use crate::error::{ArchiveError, Result};
use crate::format::MAGIC;
use crate::manifest::{Manifest, ModuleInfo, CURRENT_SCHEMA_VERSION};
use crate::sanitize::is_safe_entry_name;
use std::collections::BTreeMap;
use std::io::{Cursor, Seek, Write};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Per-entry progress callback: `(entries_written, total_entries)`.
pub type Progress<'p> = Box<dyn FnMut(usize, usize) + 'p>;

/// Archive writer.
///
/// Collects module payloads and writes one `PXPL` + ZIP archive on
/// [`finish`](Self::finish). The sink receives bytes only once the whole
/// container has been assembled, so a failure before that point leaves it
/// untouched.
pub struct ArchiveWriter<'p, W: Write> {
    writer: W,
    template: Manifest,
    modules: BTreeMap<String, String>,
    progress: Option<Progress<'p>>,
}

impl<'p, W: Write> ArchiveWriter<'p, W> {
    pub fn new(writer: W, template: Manifest) -> Self {
        Self {
            writer,
            template,
            modules: BTreeMap::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'p) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Add (or replace) a module payload. Payloads are stored verbatim.
    pub fn add_module(&mut self, key: impl Into<String>, payload: impl Into<String>) {
        self.modules.insert(key.into(), payload.into());
    }

    pub fn add_modules(&mut self, modules: impl IntoIterator<Item = (String, String)>) {
        self.modules.extend(modules);
    }

    /// Write the archive and return the manifest that was stored in it.
    pub fn finish(self) -> Result<Manifest> {
        let Self {
            mut writer,
            template,
            modules,
            mut progress,
        } = self;

        for key in modules.keys() {
            check_module_key(key)?;
        }

        let module_infos: BTreeMap<String, ModuleInfo> = modules
            .iter()
            .map(|(key, payload)| (key.clone(), ModuleInfo::for_payload(payload)))
            .collect();

        let manifest = Manifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            modules: module_infos,
            ..template
        };
        let manifest_bytes = serde_json::to_vec(&manifest)?;

        let total = modules.len() + 1;
        let mut report = |current: usize| {
            if let Some(cb) = progress.as_mut() {
                cb(current, total);
            }
        };

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        write_entry(&mut zip, MANIFEST_ENTRY, &manifest_bytes)?;
        report(1);

        for (i, (key, payload)) in modules.iter().enumerate() {
            write_entry(&mut zip, &module_entry_name(key), payload.as_bytes())?;
            report(i + 2);
        }

        let body = zip.finish()?.into_inner();

        writer.write_all(MAGIC)?;
        writer.write_all(&body)?;
        writer.flush()?;

        info!(
            modules = modules.len(),
            bytes = body.len() + MAGIC.len(),
            "wrote backup archive"
        );

        Ok(manifest)
    }
}

/// Write `modules` under `template` into `sink` in one call.
pub fn write_archive<W: Write>(
    sink: W,
    template: &Manifest,
    modules: &BTreeMap<String, String>,
) -> Result<Manifest> {
    let mut writer = ArchiveWriter::new(sink, template.clone());
    writer.add_modules(modules.iter().map(|(k, v)| (k.clone(), v.clone())));
    writer.finish()
}

fn check_module_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && is_safe_entry_name(key)
        && !key.contains(['/', '\\'])
        && module_entry_name(key) != MANIFEST_ENTRY;
    if valid {
        Ok(())
    } else {
        Err(ArchiveError::InvalidModuleKey {
            key: key.to_string(),
        })
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

fn write_entry<T: Write + Seek>(zip: &mut ZipWriter<T>, name: &str, data: &[u8]) -> Result<()> {
    zip.start_file(name, entry_options())?;
    zip.write_all(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{detect, ArchiveFormat};
    use std::io::Read;

    fn template() -> Manifest {
        Manifest::template("2.4.0", 240, 1_760_000_000_000)
    }

    #[test]
    fn test_magic_and_entry_order() {
        let mut buffer = Vec::new();
        let mut writer = ArchiveWriter::new(&mut buffer, template());
        writer.add_module("lyrics", "[]");
        writer.add_module("favorites", r#"[{"songId":1}]"#);
        writer.finish().unwrap();

        assert_eq!(detect(&buffer), ArchiveFormat::V3Zip);

        let mut zip = zip::ZipArchive::new(Cursor::new(&buffer[4..])).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["manifest.json", "favorites.json", "lyrics.json"]);

        let mut payload = String::new();
        zip.by_name("favorites.json")
            .unwrap()
            .read_to_string(&mut payload)
            .unwrap();
        assert_eq!(payload, r#"[{"songId":1}]"#);
    }

    #[test]
    fn test_schema_version_always_current() {
        let mut stale = template();
        stale.schema_version = 1;
        stale
            .modules
            .insert("ghost".into(), ModuleInfo::for_payload("[]"));

        let mut buffer = Vec::new();
        let mut writer = ArchiveWriter::new(&mut buffer, stale);
        writer.add_module("favorites", "[]");
        let manifest = writer.finish().unwrap();

        assert_eq!(manifest.schema_version, CURRENT_SCHEMA_VERSION);
        // template modules never leak into the written manifest
        assert_eq!(manifest.module_keys().collect::<Vec<_>>(), vec!["favorites"]);
        assert_eq!(manifest.app_version, "2.4.0");
    }

    #[test]
    fn test_progress_reports_every_entry() {
        let mut calls = Vec::new();
        let mut buffer = Vec::new();
        {
            let mut writer = ArchiveWriter::new(&mut buffer, template())
                .with_progress(|current, total| calls.push((current, total)));
            writer.add_module("favorites", "[]");
            writer.add_module("lyrics", "[]");
            writer.finish().unwrap();
        }
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_empty_module_set_writes_manifest_only() {
        let mut calls = Vec::new();
        let mut buffer = Vec::new();
        let manifest = ArchiveWriter::new(&mut buffer, template())
            .with_progress(|current, total| calls.push((current, total)))
            .finish()
            .unwrap();
        assert!(manifest.modules.is_empty());
        assert_eq!(calls, vec![(1, 1)]);
    }

    #[test]
    fn test_module_info_computed() {
        let payload = r#"[{"songId":1},{"songId":2}]"#;
        let mut modules = BTreeMap::new();
        modules.insert("favorites".to_string(), payload.to_string());
        let manifest = write_archive(Vec::new(), &template(), &modules).unwrap();

        let info = &manifest.modules["favorites"];
        assert_eq!(info.entry_count, 2);
        assert_eq!(info.size_bytes, payload.len() as u64);
        assert!(info.checksum.starts_with("sha256:"));
        assert_eq!(info.checksum.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_deterministic_output() {
        let mut modules = BTreeMap::new();
        modules.insert("favorites".to_string(), "[1,2,3]".to_string());
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_archive(&mut a, &template(), &modules).unwrap();
        write_archive(&mut b, &template(), &modules).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsafe_keys_rejected() {
        for key in ["", "../escape", "nested/key", "manifest", "/abs"] {
            let mut buffer = Vec::new();
            let mut writer = ArchiveWriter::new(&mut buffer, template());
            writer.add_module(key, "[]");
            let err = writer.finish().unwrap_err();
            assert!(
                matches!(err, ArchiveError::InvalidModuleKey { .. }),
                "key {:?} should be rejected",
                key
            );
            assert!(buffer.is_empty(), "nothing may reach the sink");
        }
    }

    #[test]
    fn test_sink_failure_surfaces_as_io() {
        struct FailingSink;
        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let err = ArchiveWriter::new(FailingSink, template())
            .finish()
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }
}
