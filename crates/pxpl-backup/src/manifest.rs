//! Archive manifest types (first entry in a v3 container).
//!
//! Contract: `schemaVersion` 3, `manifest.json` followed by one
//! `<module_key>.json` entry per module listed in `modules`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Schema version stamped by the current writer.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Oldest schema version the reader still restores.
pub const MIN_SUPPORTED_SCHEMA_VERSION: u32 = 1;

/// Prefix carried by every checksum the writer records.
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// Archive-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub app_version_code: i64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleInfo>,
}

impl Manifest {
    /// A template for the writer. `schema_version` and `modules` are
    /// overwritten when the archive is written.
    pub fn template(app_version: impl Into<String>, app_version_code: i64, created_at: i64) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            app_version: app_version.into(),
            app_version_code,
            created_at,
            device_info: DeviceInfo::default(),
            modules: BTreeMap::new(),
        }
    }

    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = device_info;
        self
    }

    pub fn module_keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn contains_module(&self, key: &str) -> bool {
        self.modules.contains_key(key)
    }
}

/// Provenance of the device that produced the archive. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub android_version: String,
}

/// Per-module metadata recorded at write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    /// `sha256:<hex>` over the exact payload bytes.
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub entry_count: u64,
    #[serde(default)]
    pub size_bytes: u64,
}

impl ModuleInfo {
    /// Build metadata for a payload exactly as it will be stored.
    pub fn for_payload(payload: &str) -> Self {
        let bytes = payload.as_bytes();
        Self {
            checksum: sha256_checksum(bytes),
            entry_count: count_entries(payload),
            size_bytes: bytes.len() as u64,
        }
    }
}

/// `sha256:` followed by the lowercase hex digest of `bytes`.
pub fn sha256_checksum(bytes: &[u8]) -> String {
    format!("{}{}", CHECKSUM_PREFIX, hex::encode(Sha256::digest(bytes)))
}

/// Best-effort record count for display metadata.
///
/// Array length for arrays, 1 for any other present value, 0 for `null` or
/// text that does not parse. Never fails.
pub fn count_entries(payload: &str) -> u64 {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(items)) => items.len() as u64,
        Ok(Value::Null) => 0,
        Ok(_) => 1,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_entries_fallbacks() {
        assert_eq!(count_entries("[1,2,3]"), 3);
        assert_eq!(count_entries("[]"), 0);
        assert_eq!(count_entries(r#"{"bands":[]}"#), 1);
        assert_eq!(count_entries("null"), 0);
        assert_eq!(count_entries("not json"), 0);
        assert_eq!(count_entries(""), 0);
    }

    #[test]
    fn test_checksum_format() {
        // sha256("") is well known
        assert_eq!(
            sha256_checksum(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_manifest_wire_shape() {
        let mut manifest = Manifest::template("2.1.0", 210, 1_750_000_000_000);
        manifest
            .modules
            .insert("favorites".into(), ModuleInfo::for_payload("[]"));
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["schemaVersion"], 3);
        assert_eq!(json["appVersionCode"], 210);
        assert_eq!(json["deviceInfo"]["androidVersion"], "");
        assert_eq!(json["modules"]["favorites"]["entryCount"], 0);
        assert_eq!(json["modules"]["favorites"]["sizeBytes"], 2);
    }

    #[test]
    fn test_manifest_tolerates_missing_optional_fields() {
        let manifest: Manifest = serde_json::from_str(r#"{"schemaVersion":3}"#).unwrap();
        assert_eq!(manifest.app_version, "");
        assert!(manifest.modules.is_empty());
        assert_eq!(manifest.device_info, DeviceInfo::default());
    }
}
