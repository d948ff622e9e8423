//! Export, inspect and selective restore on top of the archive and
//! validation layers.
//!
//! A fatal finding at file or manifest level rejects the archive before any
//! handler is called. Per-module failures (checksum, hard schema violation,
//! handler error) only affect that module.

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::error::ArchiveError;
use crate::format::ArchiveFormat;
use crate::limits::BackupLimits;
use crate::manifest::Manifest;
use crate::modules::ModuleKey;
use crate::sanitize::sanitize_terminal;
use crate::source::ByteSource;
use crate::validate::{ValidationError, ValidationPipeline, ValidationResult};
use anyhow::{bail, Context};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use tracing::{debug, info, warn};

/// Reads and writes the application records behind one module key.
pub trait ModuleHandler {
    fn key(&self) -> &str;

    /// Serialize the module's current data as JSON text.
    fn export(&self) -> anyhow::Result<String>;

    /// Apply a validated payload and return the number of records applied.
    fn import(&self, payload: &str) -> anyhow::Result<usize>;
}

/// Which modules an export or restore should touch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(keys.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(keys) => keys.contains(key),
        }
    }
}

/// Export the selected handlers' data into one archive.
///
/// Selecting a key with no registered handler is an error; nothing is
/// written in that case.
pub fn export_archive<W: Write>(
    sink: W,
    template: Manifest,
    handlers: &[Box<dyn ModuleHandler>],
    selection: &Selection,
    progress: Option<&mut dyn FnMut(usize, usize)>,
) -> anyhow::Result<Manifest> {
    if let Selection::Only(keys) = selection {
        for key in keys {
            if !handlers.iter().any(|h| h.key() == key) {
                bail!("no handler registered for module '{}'", sanitize_terminal(key));
            }
        }
    }

    let mut writer = ArchiveWriter::new(sink, template);
    if let Some(progress) = progress {
        writer = writer.with_progress(progress);
    }
    for handler in handlers.iter().filter(|h| selection.includes(h.key())) {
        let key = handler.key();
        let payload = handler
            .export()
            .with_context(|| format!("failed to export module '{}'", key))?;
        debug!(module = key, bytes = payload.len(), "exported module");
        writer.add_module(key, payload);
    }

    Ok(writer.finish()?)
}

/// Why an archive was refused before any module was touched.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("archive failed validation ({} fatal finding(s))", fatal_count(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

fn fatal_count(findings: &[ValidationError]) -> usize {
    findings.iter().filter(|f| f.is_fatal()).count()
}

impl Rejection {
    /// Validation findings behind the rejection; empty for read errors.
    pub fn findings(&self) -> &[ValidationError] {
        match self {
            Self::Invalid(findings) => findings,
            Self::Archive(_) => &[],
        }
    }
}

/// A validated archive, ready to plan a restore from.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub format: ArchiveFormat,
    pub manifest: Manifest,
    pub warnings: Vec<ValidationError>,
    bytes: Vec<u8>,
}

impl Inspection {
    pub fn archive_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Run file and manifest validation and decode the manifest.
pub fn inspect(source: &dyn ByteSource, limits: BackupLimits) -> Result<Inspection, Rejection> {
    let pipeline = ValidationPipeline::new(limits);

    // One read: everything below parses the buffer the file stage checked.
    let (file_result, bytes) = pipeline.validate_file_buffered(source);
    let bytes = match bytes {
        Some(bytes) if !file_result.is_fatal() => bytes,
        _ => {
            warn!(findings = file_result.findings().len(), "archive rejected at file stage");
            return Err(Rejection::Invalid(file_result.into_findings()));
        }
    };

    let format = ArchiveReader::format_of(&bytes);
    let manifest = ArchiveReader::with_limits(limits).manifest_from_bytes(&bytes)?;

    let result = file_result.merge(pipeline.validate_manifest(&manifest));
    if result.is_fatal() {
        warn!(findings = result.findings().len(), "archive rejected at manifest stage");
        return Err(Rejection::Invalid(result.into_findings()));
    }

    let warnings = result.into_findings();
    info!(
        %format,
        schema = manifest.schema_version,
        modules = manifest.modules.len(),
        warnings = warnings.len(),
        "inspected archive"
    );
    Ok(Inspection {
        format,
        manifest,
        warnings,
        bytes,
    })
}

/// Why a module was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInArchive,
    UnknownModule,
    NoHandler,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInArchive => write!(f, "not present in archive"),
            Self::UnknownModule => write!(f, "unknown module"),
            Self::NoHandler => write!(f, "no handler registered"),
        }
    }
}

/// Modules a restore will apply, and the ones it will skip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestorePlan {
    pub apply: Vec<String>,
    pub skipped: BTreeMap<String, SkipReason>,
}

impl RestorePlan {
    /// Apply selected ∩ manifest ∩ known keys.
    pub fn new(inspection: &Inspection, selection: &Selection) -> Self {
        let manifest = &inspection.manifest;
        let mut plan = Self::default();

        for key in manifest.module_keys() {
            if !selection.includes(key) {
                continue;
            }
            if ModuleKey::is_known(key) {
                plan.apply.push(key.to_string());
            } else {
                plan.skipped.insert(key.to_string(), SkipReason::UnknownModule);
            }
        }
        if let Selection::Only(keys) = selection {
            for key in keys.iter().filter(|k| !manifest.contains_module(k)) {
                plan.skipped.insert(key.clone(), SkipReason::NotInArchive);
            }
        }
        plan
    }
}

/// Result of restoring one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    Applied {
        count: usize,
        warnings: Vec<ValidationError>,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        errors: Vec<String>,
    },
}

impl ModuleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub format: ArchiveFormat,
    pub manifest: Manifest,
    pub warnings: Vec<ValidationError>,
    pub outcomes: BTreeMap<String, ModuleOutcome>,
}

impl RestoreReport {
    pub fn applied_records(&self) -> usize {
        self.outcomes
            .values()
            .map(|outcome| match outcome {
                ModuleOutcome::Applied { count, .. } => *count,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_modules(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(key, _)| key.as_str())
    }

    pub fn has_failures(&self) -> bool {
        self.failed_modules().next().is_some()
    }
}

/// Inspect, plan and apply the selected modules.
pub fn restore(
    source: &dyn ByteSource,
    selection: &Selection,
    handlers: &[Box<dyn ModuleHandler>],
    limits: BackupLimits,
) -> Result<RestoreReport, Rejection> {
    let inspection = inspect(source, limits)?;
    Ok(restore_inspected(&inspection, selection, handlers, limits))
}

/// Apply the selected modules of an already inspected archive.
pub fn restore_inspected(
    inspection: &Inspection,
    selection: &Selection,
    handlers: &[Box<dyn ModuleHandler>],
    limits: BackupLimits,
) -> RestoreReport {
    let plan = RestorePlan::new(inspection, selection);
    let pipeline = ValidationPipeline::new(limits);
    let reader = ArchiveReader::with_limits(limits);

    let mut outcomes: BTreeMap<String, ModuleOutcome> = plan
        .skipped
        .iter()
        .map(|(key, reason)| (key.clone(), ModuleOutcome::Skipped { reason: *reason }))
        .collect();

    for key in &plan.apply {
        let outcome = match handlers.iter().find(|h| h.key() == key) {
            Some(handler) => apply_module(inspection, key, handler.as_ref(), &reader, &pipeline),
            None => ModuleOutcome::Skipped {
                reason: SkipReason::NoHandler,
            },
        };
        match &outcome {
            ModuleOutcome::Applied { count, warnings } => {
                info!(module = %key, count, warnings = warnings.len(), "restored module")
            }
            ModuleOutcome::Skipped { reason } => info!(module = %key, %reason, "skipped module"),
            ModuleOutcome::Failed { errors } => {
                warn!(module = %key, errors = errors.len(), "module restore failed")
            }
        }
        outcomes.insert(key.clone(), outcome);
    }

    RestoreReport {
        format: inspection.format,
        manifest: inspection.manifest.clone(),
        warnings: inspection.warnings.clone(),
        outcomes,
    }
}

fn apply_module(
    inspection: &Inspection,
    key: &str,
    handler: &dyn ModuleHandler,
    reader: &ArchiveReader,
    pipeline: &ValidationPipeline,
) -> ModuleOutcome {
    let payload = match reader.module_from_bytes(inspection.archive_bytes(), key) {
        Ok(payload) => payload,
        Err(e) => {
            return ModuleOutcome::Failed {
                errors: vec![e.to_string()],
            }
        }
    };

    let result = pipeline.validate_module_payload(key, &payload, Some(&inspection.manifest));
    if result.is_fatal() {
        return ModuleOutcome::Failed {
            errors: fatal_messages(&result),
        };
    }
    let warnings = result.into_findings();

    match handler.import(&payload) {
        Ok(count) => ModuleOutcome::Applied { count, warnings },
        Err(e) => ModuleOutcome::Failed {
            errors: vec![format!("{:#}", e)],
        },
    }
}

fn fatal_messages(result: &ValidationResult) -> Vec<String> {
    result
        .fatal_errors()
        .into_iter()
        .map(ToString::to_string)
        .collect()
}
