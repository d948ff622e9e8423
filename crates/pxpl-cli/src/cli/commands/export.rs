use crate::cli::args::ExportArgs;
use crate::cli::helpers::selection;
use crate::exit_codes;
use crate::handlers::DirectoryHandler;
use anyhow::{Context, Result};
use pxpl_backup::{export_archive, Manifest};
use std::path::Path;
use tempfile::NamedTempFile;

pub fn run(args: ExportArgs) -> Result<i32> {
    let handlers = DirectoryHandler::present_in(&args.from);
    let selection = selection(&args.modules);

    let template = Manifest::template(
        args.app_version.clone(),
        args.app_version_code,
        chrono::Utc::now().timestamp_millis(),
    );

    // Stage next to the destination so the final rename stays on one filesystem.
    let parent = match args.output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    let mut progress = |current: usize, total: usize| {
        tracing::debug!(current, total, "wrote archive entry");
    };
    let manifest = export_archive(
        &mut tmp,
        template,
        &handlers,
        &selection,
        Some(&mut progress),
    )
    .context("export failed")?;

    tmp.persist(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    eprintln!(
        "Exported {} module(s) to {}",
        manifest.modules.len(),
        args.output.display()
    );
    for (key, info) in &manifest.modules {
        eprintln!("  {:<18} {:>8} entries {:>10} bytes", key, info.entry_count, info.size_bytes);
    }
    Ok(exit_codes::SUCCESS)
}
