use crate::exit_codes;
use anyhow::{Context, Result};
use pxpl_backup::sanitize::sanitize_terminal;
use pxpl_backup::{BackupLimits, Rejection, Selection, ValidationError};
use std::path::Path;

/// Default limits, overridden by the `--limits` file when given.
pub fn load_limits(path: Option<&Path>) -> Result<BackupLimits> {
    let Some(path) = path else {
        return Ok(BackupLimits::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read limits file {}", path.display()))?;
    BackupLimits::from_overrides_json(&text)
        .with_context(|| format!("invalid limits file {}", path.display()))
}

pub fn selection(modules: &[String]) -> Selection {
    if modules.is_empty() {
        Selection::All
    } else {
        Selection::only(modules.iter().cloned())
    }
}

pub fn print_findings(findings: &[ValidationError]) {
    for finding in findings {
        eprintln!("  {}", sanitize_terminal(&finding.to_string()));
    }
}

/// Report a rejection. Read-level I/O failures bubble up as internal errors.
pub fn report_rejection(path: &Path, rejection: Rejection) -> Result<i32> {
    match rejection {
        Rejection::Invalid(findings) => {
            eprintln!("Archive rejected: {}", path.display());
            print_findings(&findings);
            Ok(exit_codes::VALIDATION_FAILED)
        }
        Rejection::Archive(pxpl_backup::ArchiveError::Io(e)) => {
            Err(e).with_context(|| format!("failed to read {}", path.display()))
        }
        Rejection::Archive(e) => {
            eprintln!("Archive unreadable: {}: {}", path.display(), e);
            Ok(exit_codes::VALIDATION_FAILED)
        }
    }
}
