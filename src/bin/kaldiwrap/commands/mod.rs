//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod install;
pub mod plan;
pub mod stage;
pub mod toolchain;
pub mod verify;

use anyhow::Result;

use crate::cli::GlobalArgs;
use kaldiwrap::core::Workspace;
use kaldiwrap::util::GlobalContext;

/// Load the workspace the global flags point at.
pub fn workspace(global: &GlobalArgs) -> Result<Workspace> {
    let ctx = GlobalContext::new()?;
    let ws = Workspace::load(&ctx, global.manifest.as_deref())?;
    Ok(match &global.build_dir {
        Some(dir) => ws.with_build_root(ctx.cwd().join(dir)),
        None => ws,
    })
}
