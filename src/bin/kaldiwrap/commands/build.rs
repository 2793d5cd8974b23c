//! `kaldiwrap build` command

use std::io::IsTerminal;

use anyhow::Result;

use crate::cli::{BuildArgs, GlobalArgs};
use kaldiwrap::builder::toolchain::ProcessEnv;
use kaldiwrap::ops::build::{build, BuildOptions};
use kaldiwrap::util::process::SystemExecutor;

pub fn execute(global: &GlobalArgs, args: BuildArgs) -> Result<()> {
    let ws = super::workspace(global)?;

    let opts = BuildOptions {
        debug: args.debug,
        jobs: args.jobs,
        skip_wrappers: args.skip_wrappers,
        targets: args.targets,
        // Progress and verbose logs interleave badly
        progress: !args.no_progress && !global.verbose && std::io::stderr().is_terminal(),
    };

    let result = build(&ws, &ProcessEnv, &SystemExecutor, &opts)?;

    for (module, path) in &result.staged.extensions {
        eprintln!("    Finished `{}` -> {}", module, path.display());
    }
    eprintln!(
        "      Staged {} package(s) in {}",
        result.staged.packages.len(),
        ws.lib_dir().display()
    );

    Ok(())
}
