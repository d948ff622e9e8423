//! File → manifest → module validation, exposed as independent stages.

use crate::limits::BackupLimits;
use crate::manifest::Manifest;
use crate::modules::ModuleKey;
use crate::sanitize::sanitize_terminal;
use crate::source::ByteSource;
use crate::validate::{
    verify_checksum, ErrorCode, FileValidator, ManifestValidator, ModuleSchemaValidator,
    ValidationError, ValidationResult,
};

/// The full validation contract used by inspect and restore.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPipeline {
    file: FileValidator,
    manifest: ManifestValidator,
    schema: ModuleSchemaValidator,
}

impl ValidationPipeline {
    pub fn new(limits: BackupLimits) -> Self {
        Self {
            file: FileValidator::new(limits),
            manifest: ManifestValidator::new(limits),
            schema: ModuleSchemaValidator::new(limits),
        }
    }

    pub fn validate_file(&self, source: &dyn ByteSource) -> ValidationResult {
        self.file.validate(source)
    }

    /// File stage plus the buffer it checked, for callers that go on to parse.
    pub fn validate_file_buffered(
        &self,
        source: &dyn ByteSource,
    ) -> (ValidationResult, Option<Vec<u8>>) {
        self.file.validate_buffered(source)
    }

    pub fn validate_bytes(&self, bytes: &[u8], display_name: Option<&str>) -> ValidationResult {
        self.file.validate_bytes(bytes, display_name)
    }

    pub fn validate_manifest(&self, manifest: &Manifest) -> ValidationResult {
        self.manifest.validate(manifest)
    }

    pub fn validate_manifest_at(&self, manifest: &Manifest, now_ms: i64) -> ValidationResult {
        self.manifest.validate_at(manifest, now_ms)
    }

    /// Validate one module just before it is applied.
    ///
    /// With a manifest, the checksum is verified first and a mismatch ends
    /// validation. Keys outside the known set are reported and not
    /// schema-checked.
    pub fn validate_module_payload(
        &self,
        key: &str,
        payload: &str,
        manifest: Option<&Manifest>,
    ) -> ValidationResult {
        if let Some(manifest) = manifest {
            if !verify_checksum(key, payload, manifest) {
                return ValidationResult::Invalid(vec![ValidationError::error(
                    ErrorCode::ChecksumMismatch,
                    "payload does not match the recorded checksum",
                )
                .for_module(key)]);
            }
        }

        if !ModuleKey::is_known(key) {
            let shown = sanitize_terminal(key);
            return ValidationResult::Invalid(vec![ValidationError::warning(
                ErrorCode::UnknownModule,
                format!("unknown module '{}' is not validated", shown),
            )
            .for_module(shown)]);
        }

        self.schema.validate(key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ModuleInfo;

    fn manifest_with(key: &str, payload: &str) -> Manifest {
        let mut manifest = Manifest::template("2.4.0", 240, 1_760_000_000_000);
        manifest
            .modules
            .insert(key.to_string(), ModuleInfo::for_payload(payload));
        manifest
    }

    #[test]
    fn test_file_stage_buffer_matches_result() {
        let pipeline = ValidationPipeline::default();
        let source = crate::source::MemorySource::new(b"GIF89a".to_vec()).with_name("cover.gif");

        let (result, bytes) = pipeline.validate_file_buffered(&source);
        assert!(result.has_code(ErrorCode::FormatUnknown));
        assert!(result.has_code(ErrorCode::FileExtension));
        assert_eq!(bytes.as_deref(), Some(&b"GIF89a"[..]));
        assert_eq!(pipeline.validate_file(&source), result);

        let empty = crate::source::MemorySource::new(Vec::new());
        let (result, bytes) = pipeline.validate_file_buffered(&empty);
        assert!(result.has_code(ErrorCode::FileEmpty));
        assert!(bytes.is_none());
    }

    #[test]
    fn test_checksum_mismatch_short_circuits_schema() {
        let manifest = manifest_with("favorites", r#"[{"songId":1}]"#);
        let result = ValidationPipeline::default().validate_module_payload(
            "favorites",
            "not json at all",
            Some(&manifest),
        );
        assert_eq!(result.findings().len(), 1);
        assert!(result.has_code(ErrorCode::ChecksumMismatch));
        assert!(!result.has_code(ErrorCode::InvalidJson));
    }

    #[test]
    fn test_matching_checksum_runs_schema() {
        let payload = r#"[{"songId":0}]"#;
        let manifest = manifest_with("favorites", payload);
        let result =
            ValidationPipeline::default().validate_module_payload("favorites", payload, Some(&manifest));
        assert!(result.has_code(ErrorCode::InvalidSongId));
        assert!(!result.is_fatal());
    }

    #[test]
    fn test_without_manifest_only_schema_runs() {
        let result =
            ValidationPipeline::default().validate_module_payload("lyrics", "[]", None);
        assert!(result.is_valid());
    }

    #[test]
    fn test_unknown_key_is_a_warning() {
        let payload = "{ whatever";
        let manifest = manifest_with("podcasts", payload);
        let result = ValidationPipeline::default().validate_module_payload(
            "podcasts",
            payload,
            Some(&manifest),
        );
        assert!(result.has_code(ErrorCode::UnknownModule));
        assert!(!result.is_fatal());
    }
}
