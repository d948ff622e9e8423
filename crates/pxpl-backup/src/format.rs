//! Container format detection from the first header bytes.

use std::fmt;

/// Magic prefix of every versioned container.
pub const MAGIC: &[u8; 4] = b"PXPL";

/// Number of header bytes [`detect`] inspects.
pub const HEADER_LEN: usize = 8;

const ZIP_LOCAL_HEADER: &[u8; 4] = b"PK\x03\x04";
const GZIP_SIGNATURE: &[u8; 2] = b"\x1f\x8b";

/// The closed set of archive generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// `PXPL` + ZIP of `manifest.json` and per-module entries.
    V3Zip,
    /// `PXPL` + gzip of one monolithic JSON document.
    V2Gzip,
    /// gzip of one JSON document, no magic.
    LegacyGzip,
    /// Uncompressed JSON document.
    LegacyRaw,
    Unknown,
}

impl ArchiveFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V3Zip => "V3_ZIP",
            Self::V2Gzip => "V2_GZIP",
            Self::LegacyGzip => "LEGACY_GZIP",
            Self::LegacyRaw => "LEGACY_RAW",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Formats whose body is a single monolithic JSON document.
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::V2Gzip | Self::LegacyGzip | Self::LegacyRaw)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a header. Only the first [`HEADER_LEN`] bytes are considered.
///
/// Anything under the `PXPL` prefix that is not a ZIP local header is read
/// as the gzip-wrapped v2 body, including headers too short to tell.
pub fn detect(header: &[u8]) -> ArchiveFormat {
    let header = &header[..header.len().min(HEADER_LEN)];
    if header.len() < MAGIC.len() {
        return ArchiveFormat::Unknown;
    }

    if header.starts_with(MAGIC) {
        if header.len() < HEADER_LEN {
            return ArchiveFormat::V2Gzip;
        }
        let body = &header[MAGIC.len()..];
        if body.starts_with(ZIP_LOCAL_HEADER) {
            return ArchiveFormat::V3Zip;
        }
        // gzip and unrecognized post-magic content both fall through to v2
        return ArchiveFormat::V2Gzip;
    }

    if header.starts_with(GZIP_SIGNATURE) {
        return ArchiveFormat::LegacyGzip;
    }

    if header[0] == b'{' {
        return ArchiveFormat::LegacyRaw;
    }

    ArchiveFormat::Unknown
}
