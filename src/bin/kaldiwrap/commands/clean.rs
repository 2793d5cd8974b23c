//! `kaldiwrap clean` command

use anyhow::Result;

use crate::cli::GlobalArgs;
use kaldiwrap::ops::clean::clean;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    let ws = super::workspace(global)?;

    if clean(&ws)? {
        eprintln!("     Removed {}", ws.build_root().display());
    }

    Ok(())
}
