use crate::cli::args::VerifyArgs;
use crate::cli::helpers::{print_findings, report_rejection};
use crate::exit_codes;
use anyhow::Result;
use pxpl_backup::sanitize::sanitize_terminal;
use pxpl_backup::{inspect, ArchiveReader, BackupLimits, FileSource, ValidationPipeline};

/// Run every validation stage, including checksum and schema per module.
pub fn run(args: VerifyArgs, limits: BackupLimits) -> Result<i32> {
    let source = FileSource::new(&args.file);
    let inspection = match inspect(&source, limits) {
        Ok(inspection) => inspection,
        Err(rejection) => return report_rejection(&args.file, rejection),
    };
    if !inspection.warnings.is_empty() {
        eprintln!("Archive warnings:");
        print_findings(&inspection.warnings);
    }

    let reader = ArchiveReader::with_limits(limits);
    let pipeline = ValidationPipeline::new(limits);
    let mut failed = 0usize;

    for key in inspection.manifest.module_keys() {
        let shown = sanitize_terminal(key);
        let payload = match reader.module_from_bytes(inspection.archive_bytes(), key) {
            Ok(payload) => payload,
            Err(e) => {
                eprintln!("FAIL  {}: {}", shown, e);
                failed += 1;
                continue;
            }
        };

        let result =
            pipeline.validate_module_payload(key, &payload, Some(&inspection.manifest));
        if result.is_fatal() {
            eprintln!("FAIL  {}", shown);
            failed += 1;
        } else if result.is_valid() {
            eprintln!("OK    {}", shown);
        } else {
            eprintln!("WARN  {}", shown);
        }
        print_findings(result.findings());
    }

    if failed > 0 {
        eprintln!("Verification FAILED: {} module(s) failed", failed);
        return Ok(exit_codes::VALIDATION_FAILED);
    }
    eprintln!("Archive verified ({}): OK", args.file.display());
    Ok(exit_codes::SUCCESS)
}
