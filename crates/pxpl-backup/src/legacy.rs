//! Migration of pre-v3 monolithic JSON backups into manifest + module map.
//!
//! A legacy document carries every section as a top-level array and lists the
//! sections it populated in `availableSections`. A section becomes a module
//! only when its array is non-empty and its module key is listed there.

use crate::archive::ArchiveContents;
use crate::error::Result;
use crate::manifest::{DeviceInfo, Manifest, ModuleInfo};
use crate::modules::ModuleKey;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// `appVersion` stamped on synthesized manifests.
pub const LEGACY_APP_VERSION: &str = "legacy";

/// Preference keys that belonged to playlists before v2 split them out.
pub const PLAYLIST_PREFERENCE_KEYS: [&str; 3] = [
    "user_playlists_json",
    "playlist_song_sort_modes",
    "playlists_sort_option",
];

/// Legacy camelCase section fields that map one-to-one onto modules.
const DIRECT_SECTIONS: [(&str, ModuleKey); 7] = [
    ("favorites", ModuleKey::Favorites),
    ("lyrics", ModuleKey::Lyrics),
    ("searchHistory", ModuleKey::SearchHistory),
    ("transitions", ModuleKey::Transitions),
    ("engagementStats", ModuleKey::EngagementStats),
    ("playbackHistory", ModuleKey::PlaybackHistory),
    ("artistImages", ModuleKey::ArtistImages),
];

/// Convert a legacy JSON document into the v3 shape.
///
/// Fails only when the text is not a JSON object. Missing or mistyped
/// optional fields simply leave the corresponding module out.
pub fn adapt(legacy_json: &str) -> Result<ArchiveContents> {
    let root: Map<String, Value> = serde_json::from_str(legacy_json)?;

    let format_version = root
        .get("formatVersion")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1);
    let created_at = root
        .get("exportedAtEpochMs")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let available: HashSet<&str> = root
        .get("availableSections")
        .and_then(Value::as_array)
        .map(|sections| sections.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut builder = ModuleMapBuilder {
        available: &available,
        modules: BTreeMap::new(),
    };

    if format_version <= 1 {
        let (playlist_prefs, other_prefs) = split_preferences(array_field(&root, "preferences"));
        builder.insert(ModuleKey::Playlists, playlist_prefs)?;
        builder.insert(ModuleKey::GlobalSettings, other_prefs)?;
    } else {
        builder.insert(
            ModuleKey::Playlists,
            array_field(&root, "playlists").to_vec(),
        )?;
        builder.insert(
            ModuleKey::GlobalSettings,
            array_field(&root, "globalSettings").to_vec(),
        )?;
    }

    for (field, key) in DIRECT_SECTIONS {
        builder.insert(key, array_field(&root, field).to_vec())?;
    }

    let modules = builder.modules;
    let manifest = Manifest {
        schema_version: format_version,
        app_version: LEGACY_APP_VERSION.to_string(),
        app_version_code: 0,
        created_at,
        device_info: DeviceInfo::default(),
        modules: modules
            .iter()
            .map(|(key, payload)| (key.clone(), ModuleInfo::for_payload(payload)))
            .collect(),
    };

    debug!(
        format_version,
        modules = modules.len(),
        "adapted legacy backup document"
    );

    Ok(ArchiveContents { manifest, modules })
}

/// Split a v1 combined preference array by playlist key membership.
fn split_preferences(preferences: &[Value]) -> (Vec<Value>, Vec<Value>) {
    preferences.iter().cloned().partition(|entry| {
        entry
            .get("key")
            .and_then(Value::as_str)
            .is_some_and(|key| PLAYLIST_PREFERENCE_KEYS.contains(&key))
    })
}

fn array_field<'a>(root: &'a Map<String, Value>, field: &str) -> &'a [Value] {
    root.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

struct ModuleMapBuilder<'a> {
    available: &'a HashSet<&'a str>,
    modules: BTreeMap<String, String>,
}

impl ModuleMapBuilder<'_> {
    fn insert(&mut self, key: ModuleKey, records: Vec<Value>) -> Result<()> {
        if records.is_empty() || !self.available.contains(key.as_str()) {
            return Ok(());
        }
        let payload = serde_json::to_string(&Value::Array(records))?;
        self.modules.insert(key.as_str().to_string(), payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::sha256_checksum;
    use serde_json::json;

    #[test]
    fn test_v1_splits_preferences() {
        let doc = json!({
            "formatVersion": 1,
            "exportedAtEpochMs": 1_700_000_000_000_i64,
            "availableSections": ["playlists", "global_settings"],
            "preferences": [
                {"key": "user_playlists_json", "type": "string", "value": "[]"},
                {"key": "theme", "type": "string", "value": "dark"}
            ]
        });
        let contents = adapt(&doc.to_string()).unwrap();

        assert_eq!(contents.modules.len(), 2);
        let playlists: Vec<Value> =
            serde_json::from_str(&contents.modules["playlists"]).unwrap();
        let settings: Vec<Value> =
            serde_json::from_str(&contents.modules["global_settings"]).unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0]["key"], "user_playlists_json");
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0]["key"], "theme");

        assert_eq!(contents.manifest.schema_version, 1);
        assert_eq!(contents.manifest.app_version, "legacy");
        assert_eq!(contents.manifest.app_version_code, 0);
        assert_eq!(contents.manifest.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_v2_reads_separate_arrays() {
        let doc = json!({
            "formatVersion": 2,
            "availableSections": ["playlists", "global_settings", "favorites"],
            "playlists": [{"key": "playlists_sort_option", "type": "string", "value": "name"}],
            "globalSettings": [{"key": "gapless", "type": "boolean", "value": true}],
            "favorites": [{"songId": 4}, {"songId": 9}]
        });
        let contents = adapt(&doc.to_string()).unwrap();

        assert_eq!(
            contents.modules.keys().collect::<Vec<_>>(),
            vec!["favorites", "global_settings", "playlists"]
        );
        assert_eq!(contents.manifest.schema_version, 2);
        assert_eq!(contents.manifest.modules["favorites"].entry_count, 2);
        assert_eq!(contents.manifest.created_at, 0);
    }

    #[test]
    fn test_sections_gated_by_available_set() {
        let doc = json!({
            "formatVersion": 2,
            "availableSections": ["lyrics"],
            "favorites": [{"songId": 1}],
            "lyrics": [],
            "searchHistory": [{"query": "x"}]
        });
        let contents = adapt(&doc.to_string()).unwrap();
        // favorites/searchHistory undeclared, lyrics declared but empty
        assert!(contents.modules.is_empty());
        assert!(contents.manifest.modules.is_empty());
    }

    #[test]
    fn test_camel_case_fields_renamed() {
        let doc = json!({
            "formatVersion": 3,
            "availableSections": ["search_history", "engagement_stats", "playback_history", "artist_images"],
            "searchHistory": [{"query": "lofi"}],
            "engagementStats": [{"songId": 1, "playCount": 3}],
            "playbackHistory": [{"songId": 1, "durationMs": 1000}],
            "artistImages": [{"artist": "A", "imageUrl": "https://x.example/a.jpg"}]
        });
        let contents = adapt(&doc.to_string()).unwrap();
        assert_eq!(
            contents.modules.keys().collect::<Vec<_>>(),
            vec![
                "artist_images",
                "engagement_stats",
                "playback_history",
                "search_history"
            ]
        );
    }

    #[test]
    fn test_checksums_match_emitted_payloads() {
        let doc = json!({
            "formatVersion": 2,
            "availableSections": ["transitions"],
            "transitions": [{"fromId": 1, "toId": 2, "durationMs": 4000}]
        });
        let contents = adapt(&doc.to_string()).unwrap();
        let payload = &contents.modules["transitions"];
        let info = &contents.manifest.modules["transitions"];
        assert_eq!(info.checksum, sha256_checksum(payload.as_bytes()));
        assert_eq!(info.size_bytes, payload.len() as u64);
        assert_eq!(info.entry_count, 1);
    }

    #[test]
    fn test_record_key_order_preserved() {
        let raw = r#"{"formatVersion":2,"availableSections":["favorites"],"favorites":[{"z":1,"a":2,"songId":3}]}"#;
        let contents = adapt(raw).unwrap();
        assert_eq!(contents.modules["favorites"], r#"[{"z":1,"a":2,"songId":3}]"#);
    }

    #[test]
    fn test_missing_optional_fields_never_fail() {
        let contents = adapt("{}").unwrap();
        assert!(contents.modules.is_empty());
        assert_eq!(contents.manifest.schema_version, 1);

        let mistyped = r#"{"formatVersion":"two","availableSections":"all","favorites":{}}"#;
        assert!(adapt(mistyped).unwrap().modules.is_empty());
    }

    #[test]
    fn test_non_object_document_is_error() {
        assert!(adapt("[1,2]").is_err());
        assert!(adapt("{broken").is_err());
    }
}
