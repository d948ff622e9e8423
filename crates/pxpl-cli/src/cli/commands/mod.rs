use super::args::*;
use super::helpers::load_limits;

pub mod export;
pub mod inspect;
pub mod restore;
pub mod verify;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let limits = load_limits(cli.limits.as_deref())?;
    match cli.cmd {
        Command::Export(args) => export::run(args),
        Command::Inspect(args) => inspect::run(args, limits),
        Command::Verify(args) => verify::run(args, limits),
        Command::Restore(args) => restore::run(args, limits),
    }
}
