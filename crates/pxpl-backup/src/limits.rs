//! Resource limits and bounded readers for archive handling.
//!
//! EINTR retry and byte limits for hostile-input protection.

use serde::Deserialize;
use std::io::Read;

/// Injected constants for reading and validating archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupLimits {
    pub max_file_bytes: u64,
    pub max_compression_ratio: u64,
    pub max_decode_bytes: u64,
    pub max_entries_per_module: usize,
    pub max_lyrics_chars: usize,
    pub max_query_chars: usize,
    pub max_url_chars: usize,
    pub max_transition_ms: i64,
    pub future_skew_ms: i64,
}

impl Default for BackupLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,    // 50 MiB on disk
            max_compression_ratio: 100,          // inflated : archive bytes
            max_decode_bytes: 256 * 1024 * 1024, // 256 MiB inflated
            max_entries_per_module: 100_000,
            max_lyrics_chars: 100_000,
            max_query_chars: 1_000,
            max_url_chars: 2_048,
            max_transition_ms: 30_000,
            future_skew_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// Partial overrides for `BackupLimits`. Used for CLI/config JSON parsing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupLimitsOverrides {
    pub max_file_bytes: Option<u64>,
    pub max_compression_ratio: Option<u64>,
    pub max_decode_bytes: Option<u64>,
    pub max_entries_per_module: Option<usize>,
    pub max_lyrics_chars: Option<usize>,
    pub max_query_chars: Option<usize>,
    pub max_url_chars: Option<usize>,
    pub max_transition_ms: Option<i64>,
    pub future_skew_ms: Option<i64>,
}

impl BackupLimits {
    /// Apply overrides onto these defaults. Only `Some` values override.
    pub fn apply(self, overrides: BackupLimitsOverrides) -> Self {
        Self {
            max_file_bytes: overrides.max_file_bytes.unwrap_or(self.max_file_bytes),
            max_compression_ratio: overrides
                .max_compression_ratio
                .unwrap_or(self.max_compression_ratio),
            max_decode_bytes: overrides.max_decode_bytes.unwrap_or(self.max_decode_bytes),
            max_entries_per_module: overrides
                .max_entries_per_module
                .unwrap_or(self.max_entries_per_module),
            max_lyrics_chars: overrides.max_lyrics_chars.unwrap_or(self.max_lyrics_chars),
            max_query_chars: overrides.max_query_chars.unwrap_or(self.max_query_chars),
            max_url_chars: overrides.max_url_chars.unwrap_or(self.max_url_chars),
            max_transition_ms: overrides
                .max_transition_ms
                .unwrap_or(self.max_transition_ms),
            future_skew_ms: overrides.future_skew_ms.unwrap_or(self.future_skew_ms),
        }
    }

    /// Parse a JSON overrides document and apply it onto the defaults.
    pub fn from_overrides_json(json: &str) -> serde_json::Result<Self> {
        let overrides: BackupLimitsOverrides = serde_json::from_str(json)?;
        Ok(Self::default().apply(overrides))
    }
}

/// A reader that limits the total number of bytes read and fails explicitly on overflow.
pub(crate) struct LimitReader<R> {
    inner: R,
    limit: u64,
    read: u64,
    error_tag: &'static str,
}

impl<R: Read> LimitReader<R> {
    pub(crate) fn new(inner: R, limit: u64, error_tag: &'static str) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            error_tag,
        }
    }
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.read >= self.limit {
            // Only an error if the inner stream actually has more to give.
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(std::io::Error::other(format!(
                    "{}: exceeded limit of {} bytes",
                    self.error_tag, self.limit
                ))),
            };
        }

        let max_to_read = (self.limit - self.read).min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max_to_read])?;
        self.read += n as u64;

        Ok(n)
    }
}

const MAX_EINTR_RETRIES: usize = 16;

/// A reader that transparently retries on EINTR.
pub(crate) struct EintrReader<R> {
    inner: R,
}

impl<R: Read> EintrReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> Read for EintrReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut retries = 0;
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    retries += 1;
                    if retries >= MAX_EINTR_RETRIES {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::Interrupted,
                            format!(
                                "persistent EINTR: interrupted {} consecutive times",
                                MAX_EINTR_RETRIES
                            ),
                        ));
                    }
                }
                other => return other,
            }
        }
    }
}

/// Read `reader` to the end, failing once more than `limit` bytes arrive.
pub(crate) fn read_bounded<R: Read>(
    reader: R,
    limit: u64,
    what: &'static str,
) -> crate::error::Result<Vec<u8>> {
    let mut limited = LimitReader::new(EintrReader::new(reader), limit, what);
    let mut buffer = Vec::new();
    limited.read_to_end(&mut buffer).map_err(|e| {
        if e.to_string().starts_with(what) {
            crate::error::ArchiveError::LimitExceeded { what, limit }
        } else {
            crate::error::ArchiveError::Io(e)
        }
    })?;
    Ok(buffer)
}
