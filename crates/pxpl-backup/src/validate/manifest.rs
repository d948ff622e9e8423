//! Schema-version, timestamp and checksum checks on a decoded manifest.

use crate::limits::BackupLimits;
use crate::manifest::{
    sha256_checksum, Manifest, CHECKSUM_PREFIX, CURRENT_SCHEMA_VERSION,
    MIN_SUPPORTED_SCHEMA_VERSION,
};
use crate::modules::ModuleKey;
use crate::sanitize::sanitize_terminal;
use crate::validate::{ErrorCode, ValidationError, ValidationResult};
use chrono::Utc;
use tracing::warn;

/// Earliest plausible `createdAt`: 2024-01-01T00:00:00Z.
pub const EPOCH_FLOOR_MS: i64 = 1_704_067_200_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestValidator {
    limits: BackupLimits,
}

impl ManifestValidator {
    pub fn new(limits: BackupLimits) -> Self {
        Self { limits }
    }

    pub fn validate(&self, manifest: &Manifest) -> ValidationResult {
        self.validate_at(manifest, Utc::now().timestamp_millis())
    }

    /// Same as [`validate`](Self::validate) against a fixed clock.
    pub fn validate_at(&self, manifest: &Manifest, now_ms: i64) -> ValidationResult {
        let mut findings = Vec::new();

        if manifest.schema_version < MIN_SUPPORTED_SCHEMA_VERSION {
            findings.push(ValidationError::error(
                ErrorCode::SchemaTooOld,
                format!(
                    "schema version {} is older than the minimum supported {}",
                    manifest.schema_version, MIN_SUPPORTED_SCHEMA_VERSION
                ),
            ));
        } else if manifest.schema_version > CURRENT_SCHEMA_VERSION {
            findings.push(ValidationError::warning(
                ErrorCode::SchemaTooNew,
                format!(
                    "schema version {} is newer than {}; some data may be ignored",
                    manifest.schema_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if manifest.created_at > now_ms.saturating_add(self.limits.future_skew_ms) {
            findings.push(ValidationError::warning(
                ErrorCode::TimestampFuture,
                format!("created at {} is in the future", manifest.created_at),
            ));
        } else if manifest.created_at < EPOCH_FLOOR_MS {
            findings.push(ValidationError::warning(
                ErrorCode::TimestampOld,
                format!("created at {} predates the first release", manifest.created_at),
            ));
        }

        for key in manifest.module_keys() {
            if !ModuleKey::is_known(key) {
                let shown = sanitize_terminal(key);
                findings.push(
                    ValidationError::warning(
                        ErrorCode::UnknownModule,
                        format!("unknown module '{}' will be ignored", shown),
                    )
                    .for_module(shown),
                );
            }
        }

        ValidationResult::from_findings(findings)
    }

    pub fn verify_checksum(&self, key: &str, payload: &str, manifest: &Manifest) -> bool {
        verify_checksum(key, payload, manifest)
    }
}

/// Check `payload` against the checksum recorded for `key`.
///
/// Returns `true` when nothing verifiable is recorded (missing entry or a
/// checksum without the `sha256:` prefix).
pub fn verify_checksum(key: &str, payload: &str, manifest: &Manifest) -> bool {
    let Some(recorded) = manifest.modules.get(key).map(|info| info.checksum.as_str()) else {
        return true;
    };
    if !recorded.starts_with(CHECKSUM_PREFIX) {
        return true;
    }
    let actual = sha256_checksum(payload.as_bytes());
    if actual == recorded {
        true
    } else {
        warn!(module = %sanitize_terminal(key), "checksum mismatch");
        false
    }
}
