//! `kaldiwrap install` command

use anyhow::Result;

use crate::cli::{GlobalArgs, InstallArgs};
use kaldiwrap::ops::stage::install;

pub fn execute(global: &GlobalArgs, args: InstallArgs) -> Result<()> {
    let ws = super::workspace(global)?;
    let copied = install(&ws, &args.dest)?;
    eprintln!("   Installed {} file(s) into {}", copied, args.dest.display());
    Ok(())
}
