use crate::cli::args::RestoreArgs;
use crate::cli::helpers::{print_findings, report_rejection, selection};
use crate::exit_codes;
use crate::handlers::DirectoryHandler;
use anyhow::{Context, Result};
use pxpl_backup::sanitize::sanitize_terminal;
use pxpl_backup::{restore, BackupLimits, FileSource, ModuleOutcome};

pub fn run(args: RestoreArgs, limits: BackupLimits) -> Result<i32> {
    std::fs::create_dir_all(&args.into)
        .with_context(|| format!("failed to create {}", args.into.display()))?;

    let source = FileSource::new(&args.file);
    let handlers = DirectoryHandler::all_known(&args.into);
    let report = match restore(&source, &selection(&args.modules), &handlers, limits) {
        Ok(report) => report,
        Err(rejection) => return report_rejection(&args.file, rejection),
    };

    if !report.warnings.is_empty() {
        eprintln!("Archive warnings:");
        print_findings(&report.warnings);
    }

    for (key, outcome) in &report.outcomes {
        let shown = sanitize_terminal(key);
        match outcome {
            ModuleOutcome::Applied { count, warnings } => {
                eprintln!("applied  {:<20} {} record(s)", shown, count);
                print_findings(warnings);
            }
            ModuleOutcome::Skipped { reason } => {
                eprintln!("skipped  {:<20} {}", shown, reason);
            }
            ModuleOutcome::Failed { errors } => {
                eprintln!("failed   {:<20}", shown);
                for error in errors {
                    eprintln!("  {}", sanitize_terminal(error));
                }
            }
        }
    }

    if report.has_failures() {
        eprintln!("Restore incomplete: some modules failed");
        return Ok(exit_codes::RESTORE_INCOMPLETE);
    }
    eprintln!(
        "Restored {} record(s) into {}",
        report.applied_records(),
        args.into.display()
    );
    Ok(exit_codes::SUCCESS)
}
