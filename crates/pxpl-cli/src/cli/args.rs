use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pxpl",
    version,
    about = "Export, inspect, verify and restore PixelPlay backup archives"
)]
pub struct Cli {
    /// JSON file overriding validation limits (partial; unknown keys are rejected)
    #[arg(long, global = true, env = "PXPL_LIMITS", value_name = "FILE")]
    pub limits: Option<PathBuf>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Package module files from a directory into a backup archive
    Export(ExportArgs),
    /// Validate an archive and show its manifest
    Inspect(InspectArgs),
    /// Validate an archive and every module payload (checksum + schema)
    Verify(VerifyArgs),
    /// Restore modules from an archive into a directory
    Restore(RestoreArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Directory holding one `<module>.json` file per module
    #[arg(long, value_name = "DIR")]
    pub from: PathBuf,

    /// Output archive path
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: PathBuf,

    /// Module to include (repeatable; default: every module file found)
    #[arg(long = "module", value_name = "KEY")]
    pub modules: Vec<String>,

    /// App version recorded in the manifest
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    /// App version code recorded in the manifest
    #[arg(long, default_value_t = 0)]
    pub app_version_code: i64,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Archive path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print a JSON document instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Archive path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    /// Archive path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Directory receiving one `<module>.json` file per restored module
    #[arg(long, value_name = "DIR")]
    pub into: PathBuf,

    /// Module to restore (repeatable; default: every module in the archive)
    #[arg(long = "module", value_name = "KEY")]
    pub modules: Vec<String>,
}
