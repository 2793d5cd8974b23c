//! `kaldiwrap toolchain` command

use anyhow::Result;

use crate::cli::ToolchainArgs;
use kaldiwrap::builder::toolchain::{query_numpy_include, ProcessEnv, ToolchainLocator};
use kaldiwrap::util::process::SystemExecutor;

pub fn execute(args: ToolchainArgs) -> Result<()> {
    let mut config = ToolchainLocator::new(&ProcessEnv).locate()?;
    if args.numpy {
        config = query_numpy_include(config, &SystemExecutor)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Toolchain:");
    println!();
    for (key, value) in config.describe() {
        println!("  {:<18} {}", format!("{}:", key), value);
    }

    Ok(())
}
