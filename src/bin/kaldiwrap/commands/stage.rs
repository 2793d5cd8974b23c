//! `kaldiwrap stage` command

use anyhow::Result;

use crate::cli::GlobalArgs;
use kaldiwrap::ops::build::resolve_plan;
use kaldiwrap::ops::stage::{expected_artifacts, stage};

pub fn execute(global: &GlobalArgs) -> Result<()> {
    let ws = super::workspace(global)?;
    let plan = resolve_plan(&ws, &[])?;

    let report = stage(&ws, &expected_artifacts(&plan, &ws.lib_dir()))?;
    eprintln!(
        "      Staged {} extension(s), {} Python file(s) in {}",
        report.extensions.len(),
        report.python_files,
        ws.lib_dir().display()
    );

    Ok(())
}
