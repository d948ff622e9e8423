//! Per-module structural and value-range checks on decoded payloads.
//!
//! Shape violations (bad JSON, wrong top-level type, oversized arrays) are
//! errors. Individual bad records are warnings so the importer can skip them
//! one by one.

use crate::limits::BackupLimits;
use crate::modules::ModuleKey;
use crate::sanitize::{char_len, is_non_blank, sanitize_url};
use crate::validate::{ErrorCode, ValidationError, ValidationResult};
use serde_json::{Map, Value};

/// Primitive kinds a preference entry may declare in its `type` field.
pub const PREFERENCE_TYPES: [&str; 6] = ["boolean", "int", "long", "float", "string", "string_set"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleSchemaValidator {
    limits: BackupLimits,
}

impl ModuleSchemaValidator {
    pub fn new(limits: BackupLimits) -> Self {
        Self { limits }
    }

    /// Validate one module payload. Unknown keys only get the shape checks.
    pub fn validate(&self, key: &str, payload: &str) -> ValidationResult {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                return fatal(key, ErrorCode::InvalidJson, format!("payload is not valid JSON: {}", e))
            }
        };
        let module = ModuleKey::parse(key);
        let mut findings = Vec::new();

        if module.is_some_and(|m| m.is_object_shaped()) {
            let Value::Object(object) = value else {
                return fatal(key, ErrorCode::NotObject, "payload must be a JSON object");
            };
            if let Some(preferences) = object.get("preferences") {
                let Value::Array(entries) = preferences else {
                    return fatal(key, ErrorCode::NotArray, "'preferences' must be an array");
                };
                if let Some(result) = self.check_count(key, entries.len()) {
                    return result;
                }
                for (index, entry) in entries.iter().enumerate() {
                    self.check_preference(key, index, entry, &mut findings);
                }
            }
            return ValidationResult::from_findings(findings);
        }

        let Value::Array(records) = value else {
            return fatal(key, ErrorCode::NotArray, "payload must be a JSON array");
        };
        if let Some(result) = self.check_count(key, records.len()) {
            return result;
        }

        let Some(module) = module else {
            return ValidationResult::Valid;
        };
        for (index, record) in records.iter().enumerate() {
            if module.is_preference_shaped() {
                self.check_preference(key, index, record, &mut findings);
                continue;
            }
            let Value::Object(fields) = record else {
                findings.push(invalid_entry(key, index));
                continue;
            };
            if let Some(finding) = self.check_record(module, index, fields) {
                findings.push(finding.for_module(key));
            }
        }
        ValidationResult::from_findings(findings)
    }

    fn check_count(&self, key: &str, count: usize) -> Option<ValidationResult> {
        (count > self.limits.max_entries_per_module).then(|| {
            fatal(
                key,
                ErrorCode::TooManyEntries,
                format!(
                    "{} entries exceed the limit of {}",
                    count, self.limits.max_entries_per_module
                ),
            )
        })
    }

    fn check_record(
        &self,
        module: ModuleKey,
        index: usize,
        fields: &Map<String, Value>,
    ) -> Option<ValidationError> {
        let limits = &self.limits;
        match module {
            ModuleKey::Favorites => match fields.get("songId").and_then(Value::as_i64) {
                Some(id) if id > 0 => None,
                _ => Some(warning(
                    ErrorCode::InvalidSongId,
                    index,
                    "songId must be a positive integer",
                )),
            },
            ModuleKey::Lyrics => {
                let content = fields.get("content").and_then(Value::as_str).unwrap_or("");
                (char_len(content) > limits.max_lyrics_chars).then(|| {
                    warning(
                        ErrorCode::ContentTooLong,
                        index,
                        format!("lyrics exceed {} characters", limits.max_lyrics_chars),
                    )
                })
            }
            ModuleKey::SearchHistory => {
                let query = fields.get("query").and_then(Value::as_str).unwrap_or("");
                (char_len(query) > limits.max_query_chars).then(|| {
                    warning(
                        ErrorCode::QueryTooLong,
                        index,
                        format!("query exceeds {} characters", limits.max_query_chars),
                    )
                })
            }
            ModuleKey::EngagementStats => match fields.get("playCount").and_then(Value::as_f64) {
                Some(count) if count >= 0.0 => None,
                Some(_) => Some(warning(
                    ErrorCode::NegativePlayCount,
                    index,
                    "playCount must not be negative",
                )),
                None => Some(warning(ErrorCode::InvalidEntry, index, "missing playCount")),
            },
            ModuleKey::PlaybackHistory => match fields.get("durationMs").and_then(Value::as_f64) {
                Some(ms) if ms >= 0.0 => None,
                Some(_) => Some(warning(
                    ErrorCode::NegativeDuration,
                    index,
                    "durationMs must not be negative",
                )),
                None => Some(warning(ErrorCode::InvalidEntry, index, "missing durationMs")),
            },
            ModuleKey::Transitions => {
                let max = limits.max_transition_ms as f64;
                match fields.get("durationMs").and_then(Value::as_f64) {
                    Some(ms) if (0.0..=max).contains(&ms) => None,
                    _ => Some(warning(
                        ErrorCode::DurationOutOfRange,
                        index,
                        format!("durationMs must be within [0, {}]", limits.max_transition_ms),
                    )),
                }
            }
            ModuleKey::ArtistImages => {
                let url = fields.get("imageUrl").and_then(Value::as_str).unwrap_or("");
                if sanitize_url(url, limits.max_url_chars).is_some() {
                    None
                } else if char_len(url.trim()) > limits.max_url_chars {
                    Some(warning(
                        ErrorCode::UrlTooLong,
                        index,
                        format!("imageUrl exceeds {} characters", limits.max_url_chars),
                    ))
                } else {
                    Some(warning(
                        ErrorCode::InvalidUrl,
                        index,
                        "imageUrl must be an https URL",
                    ))
                }
            }
            ModuleKey::Playlists
            | ModuleKey::GlobalSettings
            | ModuleKey::QuickFill
            | ModuleKey::Equalizer => None,
        }
    }

    fn check_preference(
        &self,
        key: &str,
        index: usize,
        entry: &Value,
        findings: &mut Vec<ValidationError>,
    ) {
        let Value::Object(fields) = entry else {
            findings.push(invalid_entry(key, index));
            return;
        };
        let name = fields.get("key").and_then(Value::as_str).unwrap_or("");
        if !is_non_blank(name) {
            findings.push(
                warning(ErrorCode::MissingKey, index, "preference key is missing or blank")
                    .for_module(key),
            );
        }
        let kind = fields.get("type").and_then(Value::as_str);
        if !kind.is_some_and(|kind| PREFERENCE_TYPES.contains(&kind)) {
            findings.push(
                warning(
                    ErrorCode::InvalidPreferenceType,
                    index,
                    format!("preference type must be one of {}", PREFERENCE_TYPES.join(", ")),
                )
                .for_module(key),
            );
        }
    }
}

fn fatal(key: &str, code: ErrorCode, message: impl Into<String>) -> ValidationResult {
    ValidationResult::Invalid(vec![ValidationError::error(code, message).for_module(key)])
}

fn warning(code: ErrorCode, index: usize, message: impl AsRef<str>) -> ValidationError {
    ValidationError::warning(code, format!("entry {}: {}", index, message.as_ref()))
}

fn invalid_entry(key: &str, index: usize) -> ValidationError {
    warning(ErrorCode::InvalidEntry, index, "record is not a JSON object").for_module(key)
}
