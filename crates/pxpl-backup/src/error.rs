//! Error types for archive encode/decode operations.
//!
//! Validators never return these: they report findings through
//! [`crate::validate::ValidationResult`]. `ArchiveError` is reserved for
//! conditions where no value can be produced at all.

use thiserror::Error;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised while reading or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The byte source or sink failed. Surfaced verbatim, never retried.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ZIP container could not be parsed or written.
    #[error("corrupt archive container: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A gzip-wrapped legacy body failed to inflate.
    #[error("corrupt gzip body: {0}")]
    Gzip(std::io::Error),

    /// The manifest or legacy document is not valid JSON of the expected shape.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The header does not match any supported archive generation.
    #[error("unrecognized archive format")]
    UnknownFormat,

    /// A v3 container without its reserved manifest entry.
    #[error("archive has no manifest entry")]
    MissingManifest,

    /// The requested module is not present in the archive body.
    #[error("module not found in archive: {key}")]
    ModuleNotFound { key: String },

    /// A module key that cannot be stored as a safe entry name.
    #[error("invalid module key: '{key}'")]
    InvalidModuleKey { key: String },

    /// An entry decoded to bytes that are not UTF-8 text.
    #[error("entry '{entry}' is not valid UTF-8")]
    InvalidUtf8 { entry: String },

    /// A bounded read hit its ceiling.
    #[error("{what} exceeded limit of {limit} bytes")]
    LimitExceeded { what: &'static str, limit: u64 },
}

impl ArchiveError {
    /// Returns true if this error means the requested module is absent.
    pub fn is_module_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }

    /// Returns true for format-level failures (as opposed to I/O).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Zip(_)
                | Self::Gzip(_)
                | Self::Json(_)
                | Self::UnknownFormat
                | Self::MissingManifest
                | Self::InvalidUtf8 { .. }
        )
    }
}
