//! Validation of untrusted archives: file → manifest → module schema.
//!
//! Every validator returns a [`ValidationResult`] instead of raising. A result
//! with at least one [`Severity::Error`] finding is fatal for its scope; a
//! result holding only warnings is advisory.

pub mod file;
pub mod manifest;
pub mod pipeline;
pub mod schema;

use serde::Serialize;
use std::fmt;

pub use file::{FileValidator, ACCEPTED_EXTENSIONS};
pub use manifest::{verify_checksum, ManifestValidator, EPOCH_FLOOR_MS};
pub use pipeline::ValidationPipeline;
pub use schema::{ModuleSchemaValidator, PREFERENCE_TYPES};

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// Stable finding codes. The string form is part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileAccess,
    FileEmpty,
    FileTooLarge,
    FileExtension,
    FormatUnknown,
    ZipPathTraversal,
    ZipUnexpectedEntry,
    ZipBomb,
    ZipCorrupt,
    SchemaTooOld,
    SchemaTooNew,
    TimestampFuture,
    TimestampOld,
    UnknownModule,
    InvalidJson,
    NotArray,
    NotObject,
    TooManyEntries,
    ChecksumMismatch,
    InvalidEntry,
    InvalidSongId,
    ContentTooLong,
    QueryTooLong,
    NegativePlayCount,
    NegativeDuration,
    InvalidUrl,
    UrlTooLong,
    DurationOutOfRange,
    MissingKey,
    InvalidPreferenceType,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FileAccess => "FILE_ACCESS",
            Self::FileEmpty => "FILE_EMPTY",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::FileExtension => "FILE_EXTENSION",
            Self::FormatUnknown => "FORMAT_UNKNOWN",
            Self::ZipPathTraversal => "ZIP_PATH_TRAVERSAL",
            Self::ZipUnexpectedEntry => "ZIP_UNEXPECTED_ENTRY",
            Self::ZipBomb => "ZIP_BOMB",
            Self::ZipCorrupt => "ZIP_CORRUPT",
            Self::SchemaTooOld => "SCHEMA_TOO_OLD",
            Self::SchemaTooNew => "SCHEMA_TOO_NEW",
            Self::TimestampFuture => "TIMESTAMP_FUTURE",
            Self::TimestampOld => "TIMESTAMP_OLD",
            Self::UnknownModule => "UNKNOWN_MODULE",
            Self::InvalidJson => "INVALID_JSON",
            Self::NotArray => "NOT_ARRAY",
            Self::NotObject => "NOT_OBJECT",
            Self::TooManyEntries => "TOO_MANY_ENTRIES",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::InvalidEntry => "INVALID_ENTRY",
            Self::InvalidSongId => "INVALID_SONG_ID",
            Self::ContentTooLong => "CONTENT_TOO_LONG",
            Self::QueryTooLong => "QUERY_TOO_LONG",
            Self::NegativePlayCount => "NEGATIVE_PLAY_COUNT",
            Self::NegativeDuration => "NEGATIVE_DURATION",
            Self::InvalidUrl => "INVALID_URL",
            Self::UrlTooLong => "URL_TOO_LONG",
            Self::DurationOutOfRange => "DURATION_OUT_OF_RANGE",
            Self::MissingKey => "MISSING_KEY",
            Self::InvalidPreferenceType => "INVALID_PREFERENCE_TYPE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub severity: Severity,
}

impl ValidationError {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            module: None,
            severity: Severity::Error,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            module: None,
            severity: Severity::Warning,
        }
    }

    pub fn for_module(mut self, key: impl Into<String>) -> Self {
        self.module = Some(key.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(module) = &self.module {
            write!(f, " (module: {})", module)?;
        }
        Ok(())
    }
}

/// Outcome of a validation stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    #[default]
    Valid,
    Invalid(Vec<ValidationError>),
}

impl ValidationResult {
    /// `Valid` when there are no findings at all, otherwise `Invalid`.
    pub fn from_findings(findings: Vec<ValidationError>) -> Self {
        if findings.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(findings)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// True when at least one finding is an error.
    pub fn is_fatal(&self) -> bool {
        self.findings().iter().any(ValidationError::is_fatal)
    }

    pub fn findings(&self) -> &[ValidationError] {
        match self {
            Self::Valid => &[],
            Self::Invalid(findings) => findings,
        }
    }

    pub fn into_findings(self) -> Vec<ValidationError> {
        match self {
            Self::Valid => Vec::new(),
            Self::Invalid(findings) => findings,
        }
    }

    pub fn fatal_errors(&self) -> Vec<&ValidationError> {
        self.findings().iter().filter(|f| f.is_fatal()).collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.findings().iter().filter(|f| !f.is_fatal()).collect()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.findings().iter().any(|f| f.code == code)
    }

    /// Concatenate the findings of two results.
    pub fn merge(self, other: ValidationResult) -> Self {
        let mut findings = self.into_findings();
        findings.extend(other.into_findings());
        Self::from_findings(findings)
    }
}
