use crate::cli::args::InspectArgs;
use crate::cli::helpers::{print_findings, report_rejection};
use crate::exit_codes;
use anyhow::Result;
use pxpl_backup::sanitize::sanitize_terminal;
use pxpl_backup::{inspect, BackupLimits, FileSource, Inspection};

pub fn run(args: InspectArgs, limits: BackupLimits) -> Result<i32> {
    let source = FileSource::new(&args.file);
    let inspection = match inspect(&source, limits) {
        Ok(inspection) => inspection,
        Err(rejection) => return report_rejection(&args.file, rejection),
    };

    if args.json {
        let doc = serde_json::json!({
            "format": inspection.format.as_str(),
            "manifest": inspection.manifest,
            "warnings": inspection.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(exit_codes::SUCCESS);
    }

    print_table(&inspection);
    Ok(exit_codes::SUCCESS)
}

fn print_table(inspection: &Inspection) {
    let manifest = &inspection.manifest;
    let created = chrono::DateTime::from_timestamp_millis(manifest.created_at)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| manifest.created_at.to_string());

    println!("Backup Archive Inspector");
    println!("========================");
    println!("Format:      {}", inspection.format);
    println!("Schema:      {}", manifest.schema_version);
    println!(
        "App:         {} ({})",
        sanitize_terminal(&manifest.app_version),
        manifest.app_version_code
    );
    println!("Created:     {}", created);
    let device = &manifest.device_info;
    if !device.model.is_empty() || !device.manufacturer.is_empty() {
        println!(
            "Device:      {} {} (Android {})",
            sanitize_terminal(&device.manufacturer),
            sanitize_terminal(&device.model),
            sanitize_terminal(&device.android_version)
        );
    }
    println!();
    println!("{:<20} {:>8} {:>10}  CHECKSUM", "MODULE", "ENTRIES", "BYTES");
    println!("{:-<20} {:->8} {:->10}  {:-<20}", "", "", "", "");
    for (key, info) in &manifest.modules {
        let checksum = sanitize_terminal(&info.checksum);
        let short: String = checksum.chars().take(23).collect();
        println!(
            "{:<20} {:>8} {:>10}  {}",
            sanitize_terminal(key),
            info.entry_count,
            info.size_bytes,
            short
        );
    }

    if !inspection.warnings.is_empty() {
        println!();
        eprintln!("Warnings:");
        print_findings(&inspection.warnings);
    }
}
