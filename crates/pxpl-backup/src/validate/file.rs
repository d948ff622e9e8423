//! Structural, size and safety checks on raw archive bytes.

use crate::error::ArchiveError;
use crate::format::{detect, ArchiveFormat, HEADER_LEN, MAGIC};
use crate::limits::{read_bounded, BackupLimits};
use crate::sanitize::{is_safe_entry_name, sanitize_terminal};
use crate::source::ByteSource;
use crate::validate::{ErrorCode, ValidationError, ValidationResult};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::warn;
use zip::ZipArchive;

/// File extensions a backup is expected to carry.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["pxpl", "json"];

const SCAN_CHUNK: usize = 8 * 1024;

/// Checks run before any byte of the archive is trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileValidator {
    limits: BackupLimits,
}

impl FileValidator {
    pub fn new(limits: BackupLimits) -> Self {
        Self { limits }
    }

    /// Validate a byte source. Fatal conditions return immediately.
    pub fn validate(&self, source: &dyn ByteSource) -> ValidationResult {
        self.validate_buffered(source).0
    }

    /// Validate a byte source, reading it exactly once.
    ///
    /// The buffer comes back whenever the body was read, so callers can parse
    /// the very bytes that were checked. It is `None` only for fatal results.
    pub fn validate_buffered(&self, source: &dyn ByteSource) -> (ValidationResult, Option<Vec<u8>>) {
        let reader = match source.open() {
            Ok(reader) => reader,
            Err(e) => {
                return (
                    fatal(ErrorCode::FileAccess, format!("cannot open source: {}", e)),
                    None,
                )
            }
        };
        let len = match source.len() {
            Ok(len) => len,
            Err(e) => {
                return (
                    fatal(ErrorCode::FileAccess, format!("cannot stat source: {}", e)),
                    None,
                )
            }
        };
        if len == 0 {
            return (fatal(ErrorCode::FileEmpty, "backup file is empty"), None);
        }
        if len > self.limits.max_file_bytes {
            let message = format!(
                "backup file is {} bytes, limit is {}",
                len, self.limits.max_file_bytes
            );
            return (fatal(ErrorCode::FileTooLarge, message), None);
        }

        let mut findings = Vec::new();
        if let Some(name) = source.display_name() {
            check_extension(&name, &mut findings);
        }

        let bytes = match read_bounded(reader, self.limits.max_file_bytes, "LimitFileBytes") {
            Ok(bytes) => bytes,
            Err(ArchiveError::LimitExceeded { limit, .. }) => {
                findings.push(ValidationError::error(
                    ErrorCode::FileTooLarge,
                    format!("backup file exceeds limit of {} bytes", limit),
                ));
                return (ValidationResult::from_findings(findings), None);
            }
            Err(e) => {
                findings.push(ValidationError::error(
                    ErrorCode::FileAccess,
                    format!("cannot read source: {}", e),
                ));
                return (ValidationResult::from_findings(findings), None);
            }
        };
        if bytes.is_empty() {
            findings.push(ValidationError::error(ErrorCode::FileEmpty, "backup file is empty"));
            return (ValidationResult::from_findings(findings), None);
        }

        self.check_body(&bytes, &mut findings);
        (ValidationResult::from_findings(findings), Some(bytes))
    }

    /// Validate an in-memory archive; `display_name` feeds the extension check.
    pub fn validate_bytes(&self, bytes: &[u8], display_name: Option<&str>) -> ValidationResult {
        if bytes.is_empty() {
            return fatal(ErrorCode::FileEmpty, "backup file is empty");
        }
        if bytes.len() as u64 > self.limits.max_file_bytes {
            return fatal(
                ErrorCode::FileTooLarge,
                format!(
                    "backup file is {} bytes, limit is {}",
                    bytes.len(),
                    self.limits.max_file_bytes
                ),
            );
        }

        let mut findings = Vec::new();
        if let Some(name) = display_name {
            check_extension(name, &mut findings);
        }
        self.check_body(bytes, &mut findings);
        ValidationResult::from_findings(findings)
    }

    fn check_body(&self, bytes: &[u8], findings: &mut Vec<ValidationError>) {
        let header = &bytes[..bytes.len().min(HEADER_LEN)];
        match detect(header) {
            ArchiveFormat::Unknown => findings.push(ValidationError::error(
                ErrorCode::FormatUnknown,
                "unrecognized backup format",
            )),
            ArchiveFormat::V3Zip => self.scan_zip(bytes, findings),
            _ => {}
        }
    }

    /// Walk every entry, inflating it to count real decompressed bytes.
    fn scan_zip(&self, bytes: &[u8], findings: &mut Vec<ValidationError>) {
        let ceiling = (bytes.len() as u64).saturating_mul(self.limits.max_compression_ratio);
        let mut zip = match ZipArchive::new(Cursor::new(&bytes[MAGIC.len()..])) {
            Ok(zip) => zip,
            Err(e) => {
                findings.push(ValidationError::error(
                    ErrorCode::ZipCorrupt,
                    format!("corrupt archive container: {}", e),
                ));
                return;
            }
        };

        let mut total: u64 = 0;
        let mut chunk = vec![0u8; SCAN_CHUNK];
        for i in 0..zip.len() {
            let mut entry = match zip.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    findings.push(ValidationError::error(
                        ErrorCode::ZipCorrupt,
                        format!("corrupt entry #{}: {}", i, e),
                    ));
                    return;
                }
            };
            let name = entry.name().to_string();

            if !is_safe_entry_name(&name) {
                warn!(entry = %sanitize_terminal(&name), "path traversal entry in archive");
                findings.push(ValidationError::error(
                    ErrorCode::ZipPathTraversal,
                    format!("unsafe entry name: {}", sanitize_terminal(&name)),
                ));
                return;
            }
            if !name.ends_with(".json") {
                findings.push(ValidationError::warning(
                    ErrorCode::ZipUnexpectedEntry,
                    format!("unexpected entry: {}", sanitize_terminal(&name)),
                ));
            }

            loop {
                match entry.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        total += n as u64;
                        if total > ceiling {
                            warn!(
                                compressed = bytes.len(),
                                inflated = total,
                                "decompression ratio exceeded"
                            );
                            findings.push(ValidationError::error(
                                ErrorCode::ZipBomb,
                                format!(
                                    "decompressed size exceeds {}x the archive size",
                                    self.limits.max_compression_ratio
                                ),
                            ));
                            return;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        findings.push(ValidationError::error(
                            ErrorCode::ZipCorrupt,
                            format!(
                                "corrupt entry {}: {}",
                                sanitize_terminal(&name),
                                e
                            ),
                        ));
                        return;
                    }
                }
            }
        }
    }
}

fn fatal(code: ErrorCode, message: impl Into<String>) -> ValidationResult {
    ValidationResult::Invalid(vec![ValidationError::error(code, message)])
}

fn check_extension(name: &str, findings: &mut Vec<ValidationError>) {
    let accepted = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false);
    if !accepted {
        findings.push(ValidationError::warning(
            ErrorCode::FileExtension,
            format!(
                "unexpected file extension: {} (expected .{})",
                sanitize_terminal(name),
                ACCEPTED_EXTENSIONS.join(" or .")
            ),
        ));
    }
}
