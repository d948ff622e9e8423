//! Archive reader for every supported format generation.
//!
//! Reads the whole source into memory once (bounded by
//! [`BackupLimits::max_file_bytes`]), detects the format from the header and
//! dispatches:
//! - `V3Zip`: entries are read lazily from the ZIP body
//! - `V2Gzip` / `LegacyGzip` / `LegacyRaw`: the single JSON document is
//!   inflated and handed to [`crate::legacy::adapt`]
//! - `Unknown`: fatal for every entry point

use crate::archive::{module_entry_name, module_key_for_entry, ArchiveContents, MANIFEST_ENTRY};
use crate::error::{ArchiveError, Result};
use crate::format::{detect, ArchiveFormat, HEADER_LEN, MAGIC};
use crate::legacy;
use crate::limits::{read_bounded, BackupLimits};
use crate::manifest::Manifest;
use crate::sanitize::sanitize_terminal;
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Reader with injected limits. Holds no per-archive state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReader {
    limits: BackupLimits,
}

/// Decoded body, dispatched once per call.
enum Body<'a> {
    Zip(ZipArchive<Cursor<&'a [u8]>>),
    Legacy(ArchiveContents),
}

impl ArchiveReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: BackupLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &BackupLimits {
        &self.limits
    }

    /// Read only the manifest.
    pub fn read_manifest<R: Read>(&self, source: R) -> Result<Manifest> {
        let bytes = self.read_source(source)?;
        self.manifest_from_bytes(&bytes)
    }

    /// Read one module payload. `ModuleNotFound` if the key is absent.
    pub fn read_module_payload<R: Read>(&self, source: R, key: &str) -> Result<String> {
        let bytes = self.read_source(source)?;
        self.module_from_bytes(&bytes, key)
    }

    /// Read every module payload keyed by module key.
    pub fn read_all_module_payloads<R: Read>(&self, source: R) -> Result<BTreeMap<String, String>> {
        let bytes = self.read_source(source)?;
        self.modules_from_bytes(&bytes)
    }

    /// Read manifest and all payloads in one pass.
    pub fn read_contents<R: Read>(&self, source: R) -> Result<ArchiveContents> {
        let bytes = self.read_source(source)?;
        self.contents_from_bytes(&bytes)
    }

    /// Detect the format of an in-memory archive.
    pub fn format_of(bytes: &[u8]) -> ArchiveFormat {
        detect(&bytes[..bytes.len().min(HEADER_LEN)])
    }

    pub fn manifest_from_bytes(&self, bytes: &[u8]) -> Result<Manifest> {
        match self.open_body(bytes)? {
            Body::Zip(mut zip) => self.zip_manifest(&mut zip),
            Body::Legacy(contents) => Ok(contents.manifest),
        }
    }

    pub fn module_from_bytes(&self, bytes: &[u8], key: &str) -> Result<String> {
        let not_found = || ArchiveError::ModuleNotFound {
            key: key.to_string(),
        };
        match self.open_body(bytes)? {
            Body::Zip(mut zip) => {
                let entry = module_entry_name(key);
                if module_key_for_entry(&entry).is_none() {
                    return Err(not_found());
                }
                match zip.by_name(&entry) {
                    Ok(file) => self.read_entry_text(file, &entry),
                    Err(ZipError::FileNotFound) => Err(not_found()),
                    Err(e) => Err(e.into()),
                }
            }
            Body::Legacy(mut contents) => contents.modules.remove(key).ok_or_else(not_found),
        }
    }

    pub fn modules_from_bytes(&self, bytes: &[u8]) -> Result<BTreeMap<String, String>> {
        match self.open_body(bytes)? {
            Body::Zip(mut zip) => {
                let manifest = self.zip_manifest(&mut zip)?;
                self.zip_modules(&mut zip, &manifest)
            }
            Body::Legacy(contents) => Ok(contents.modules),
        }
    }

    pub fn contents_from_bytes(&self, bytes: &[u8]) -> Result<ArchiveContents> {
        match self.open_body(bytes)? {
            Body::Zip(mut zip) => {
                let manifest = self.zip_manifest(&mut zip)?;
                let modules = self.zip_modules(&mut zip, &manifest)?;
                Ok(ArchiveContents { manifest, modules })
            }
            Body::Legacy(contents) => Ok(contents),
        }
    }

    fn read_source<R: Read>(&self, source: R) -> Result<Vec<u8>> {
        read_bounded(source, self.limits.max_file_bytes, "LimitFileBytes")
    }

    fn open_body<'a>(&self, bytes: &'a [u8]) -> Result<Body<'a>> {
        let format = Self::format_of(bytes);
        debug!(%format, bytes = bytes.len(), "dispatching archive body");

        match format {
            ArchiveFormat::V3Zip => {
                let zip = ZipArchive::new(Cursor::new(&bytes[MAGIC.len()..]))?;
                Ok(Body::Zip(zip))
            }
            ArchiveFormat::V2Gzip => {
                let text = self.inflate(&bytes[MAGIC.len()..])?;
                Ok(Body::Legacy(legacy::adapt(&text)?))
            }
            ArchiveFormat::LegacyGzip => {
                let text = self.inflate(bytes)?;
                Ok(Body::Legacy(legacy::adapt(&text)?))
            }
            ArchiveFormat::LegacyRaw => {
                let text = std::str::from_utf8(bytes).map_err(|_| ArchiveError::InvalidUtf8 {
                    entry: "legacy document".to_string(),
                })?;
                Ok(Body::Legacy(legacy::adapt(text)?))
            }
            ArchiveFormat::Unknown => Err(ArchiveError::UnknownFormat),
        }
    }

    fn inflate(&self, compressed: &[u8]) -> Result<String> {
        let decoded = read_bounded(
            GzDecoder::new(compressed),
            self.limits.max_decode_bytes,
            "LimitDecodeBytes",
        )
        .map_err(|e| match e {
            ArchiveError::Io(io) => ArchiveError::Gzip(io),
            other => other,
        })?;
        String::from_utf8(decoded).map_err(|_| ArchiveError::InvalidUtf8 {
            entry: "legacy document".to_string(),
        })
    }

    fn zip_manifest(&self, zip: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Manifest> {
        let file = match zip.by_name(MANIFEST_ENTRY) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::MissingManifest),
            Err(e) => return Err(e.into()),
        };
        let text = self.read_entry_text(file, MANIFEST_ENTRY)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Module entries the manifest declares. Undeclared entries carry no
    /// checksum to verify against, so they are left out.
    fn zip_modules(
        &self,
        zip: &mut ZipArchive<Cursor<&[u8]>>,
        manifest: &Manifest,
    ) -> Result<BTreeMap<String, String>> {
        let mut modules = BTreeMap::new();
        let mut budget = self.limits.max_decode_bytes;

        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let Some(key) = module_key_for_entry(&name) else {
                continue;
            };
            if !manifest.contains_module(key) {
                warn!(entry = %sanitize_terminal(&name), "skipping module entry missing from manifest");
                continue;
            }
            let key = key.to_string();

            let bytes = read_bounded(file, budget, "LimitDecodeBytes")?;
            budget -= bytes.len() as u64;
            let text = String::from_utf8(bytes).map_err(|_| ArchiveError::InvalidUtf8 {
                entry: name.clone(),
            })?;
            modules.insert(key, text);
        }

        Ok(modules)
    }

    fn read_entry_text<R: Read>(&self, file: R, name: &str) -> Result<String> {
        let bytes = read_bounded(file, self.limits.max_decode_bytes, "LimitDecodeBytes")?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::InvalidUtf8 {
            entry: name.to_string(),
        })
    }
}

/// Read the manifest with default limits.
pub fn read_manifest<R: Read>(source: R) -> Result<Manifest> {
    ArchiveReader::new().read_manifest(source)
}

/// Read one module payload with default limits.
pub fn read_module_payload<R: Read>(source: R, key: &str) -> Result<String> {
    ArchiveReader::new().read_module_payload(source, key)
}

/// Read every module payload with default limits.
pub fn read_all_module_payloads<R: Read>(source: R) -> Result<BTreeMap<String, String>> {
    ArchiveReader::new().read_all_module_payloads(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveWriter;
    use crate::manifest::ModuleInfo;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn v3_archive(modules: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = ArchiveWriter::new(&mut buffer, Manifest::template("2.4.0", 240, 0));
        for (key, payload) in modules {
            writer.add_module(*key, *payload);
        }
        writer.finish().unwrap();
        buffer
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    const LEGACY_DOC: &str = r#"{"formatVersion":2,"exportedAtEpochMs":1710000000000,"availableSections":["favorites"],"favorites":[{"songId":5}]}"#;

    #[test]
    fn test_v3_manifest_and_payload() {
        let archive = v3_archive(&[("favorites", "[1]"), ("lyrics", "[]")]);
        let reader = ArchiveReader::new();

        let manifest = reader.read_manifest(Cursor::new(&archive)).unwrap();
        assert_eq!(
            manifest.module_keys().collect::<Vec<_>>(),
            vec!["favorites", "lyrics"]
        );
        assert_eq!(
            reader
                .read_module_payload(Cursor::new(&archive), "favorites")
                .unwrap(),
            "[1]"
        );
    }

    #[test]
    fn test_v3_missing_module() {
        let archive = v3_archive(&[("favorites", "[]")]);
        let err = read_module_payload(Cursor::new(&archive), "transitions").unwrap_err();
        assert!(err.is_module_not_found());

        // the manifest entry is never addressable as a module
        let err = read_module_payload(Cursor::new(&archive), "manifest").unwrap_err();
        assert!(err.is_module_not_found());
    }

    #[test]
    fn test_v2_gzip_body() {
        let mut archive = MAGIC.to_vec();
        archive.extend(gzip(LEGACY_DOC.as_bytes()));
        assert_eq!(ArchiveReader::format_of(&archive), ArchiveFormat::V2Gzip);

        let manifest = read_manifest(Cursor::new(&archive)).unwrap();
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(manifest.created_at, 1_710_000_000_000);
        assert_eq!(
            read_module_payload(Cursor::new(&archive), "favorites").unwrap(),
            r#"[{"songId":5}]"#
        );
    }

    #[test]
    fn test_legacy_gzip_and_raw_agree() {
        let gz = gzip(LEGACY_DOC.as_bytes());
        let from_gzip = read_all_module_payloads(Cursor::new(&gz)).unwrap();
        let from_raw = read_all_module_payloads(Cursor::new(LEGACY_DOC.as_bytes())).unwrap();
        assert_eq!(from_gzip, from_raw);
        assert_eq!(from_raw.len(), 1);
    }

    #[test]
    fn test_legacy_missing_module() {
        let err =
            read_module_payload(Cursor::new(LEGACY_DOC.as_bytes()), "lyrics").unwrap_err();
        assert!(err.is_module_not_found());
    }

    #[test]
    fn test_unknown_format_is_fatal() {
        let data = b"NOPE, not an archive";
        assert!(matches!(
            read_manifest(Cursor::new(data)),
            Err(ArchiveError::UnknownFormat)
        ));
        assert!(matches!(
            read_all_module_payloads(Cursor::new(data)),
            Err(ArchiveError::UnknownFormat)
        ));
        assert!(matches!(
            read_module_payload(Cursor::new(data), "favorites"),
            Err(ArchiveError::UnknownFormat)
        ));
    }

    #[test]
    fn test_corrupt_v3_body() {
        let mut archive = v3_archive(&[("favorites", "[]")]);
        archive.truncate(20);
        let err = read_manifest(Cursor::new(&archive)).unwrap_err();
        assert!(err.is_format_error(), "got {:?}", err);
    }

    #[test]
    fn test_corrupt_gzip_body() {
        let mut archive = MAGIC.to_vec();
        archive.extend_from_slice(b"\x1f\x8bgarbage-garbage");
        let err = read_manifest(Cursor::new(&archive)).unwrap_err();
        assert!(matches!(err, ArchiveError::Gzip(_)), "got {:?}", err);
    }

    #[test]
    fn test_undeclared_entries_are_dropped() {
        let mut manifest = Manifest::template("2.4.0", 240, 0);
        manifest
            .modules
            .insert("lyrics".to_string(), ModuleInfo::for_payload("[]"));
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(MANIFEST_ENTRY, options).unwrap();
        zip.write_all(&serde_json::to_vec(&manifest).unwrap()).unwrap();
        zip.start_file("favorites.json", options).unwrap();
        zip.write_all(b"[1]").unwrap();
        zip.start_file("lyrics.json", options).unwrap();
        zip.write_all(b"[]").unwrap();
        let mut archive = MAGIC.to_vec();
        archive.extend(zip.finish().unwrap().into_inner());

        let modules = read_all_module_payloads(Cursor::new(&archive)).unwrap();
        assert_eq!(modules.keys().collect::<Vec<_>>(), vec!["lyrics"]);
        let contents = ArchiveReader::new()
            .read_contents(Cursor::new(&archive))
            .unwrap();
        assert!(!contents.modules.contains_key("favorites"));
    }

    #[test]
    fn test_v3_without_manifest() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("favorites.json", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"[]").unwrap();
        let mut archive = MAGIC.to_vec();
        archive.extend(zip.finish().unwrap().into_inner());

        assert!(matches!(
            read_manifest(Cursor::new(&archive)),
            Err(ArchiveError::MissingManifest)
        ));
        // module entries are still readable
        assert_eq!(
            read_module_payload(Cursor::new(&archive), "favorites").unwrap(),
            "[]"
        );
    }

    #[test]
    fn test_source_size_cap() {
        let limits = BackupLimits {
            max_file_bytes: 16,
            ..BackupLimits::default()
        };
        let archive = v3_archive(&[("favorites", "[]")]);
        let err = ArchiveReader::with_limits(limits)
            .read_manifest(Cursor::new(&archive))
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::LimitExceeded {
                what: "LimitFileBytes",
                ..
            }
        ));
    }

    #[test]
    fn test_inflate_cap() {
        let limits = BackupLimits {
            max_decode_bytes: 64,
            ..BackupLimits::default()
        };
        let doc = format!(
            r#"{{"formatVersion":2,"availableSections":["lyrics"],"lyrics":[{{"content":"{}"}}]}}"#,
            "la".repeat(500)
        );
        let gz = gzip(doc.as_bytes());
        let err = ArchiveReader::with_limits(limits)
            .read_manifest(Cursor::new(&gz))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::LimitExceeded { .. }), "got {:?}", err);
    }
}
