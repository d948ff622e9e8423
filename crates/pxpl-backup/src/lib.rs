pub mod archive;
pub mod error;
pub mod format;
pub mod legacy;
pub mod limits;
pub mod manifest;
pub mod modules;
pub mod restore;
pub mod sanitize;
pub mod source;
pub mod validate;

// Convenience re-exports
pub use archive::{
    read_all_module_payloads, read_manifest, read_module_payload, ArchiveContents,
    ArchiveReader, ArchiveWriter,
};
pub use error::{ArchiveError, Result};
pub use format::{detect, ArchiveFormat};
pub use limits::{BackupLimits, BackupLimitsOverrides};
pub use manifest::{DeviceInfo, Manifest, ModuleInfo, CURRENT_SCHEMA_VERSION};
pub use modules::ModuleKey;
pub use restore::{
    export_archive, inspect, restore, restore_inspected, Inspection, ModuleHandler,
    ModuleOutcome, Rejection, RestorePlan, RestoreReport, Selection, SkipReason,
};
pub use source::{ByteSource, FileSource, MemorySource};
pub use validate::{
    verify_checksum, ErrorCode, FileValidator, ManifestValidator, ModuleSchemaValidator,
    Severity, ValidationError, ValidationPipeline, ValidationResult,
};
