//! `kaldiwrap verify` command

use std::io::IsTerminal;

use anyhow::Result;

use crate::cli::{GlobalArgs, VerifyArgs};
use kaldiwrap::builder::toolchain::ProcessEnv;
use kaldiwrap::ops::verify::{verify, VerifyOptions};
use kaldiwrap::util::diagnostic::{emit, Diagnostic};
use kaldiwrap::util::process::SystemExecutor;

pub fn execute(global: &GlobalArgs, args: VerifyArgs) -> Result<()> {
    let ws = super::workspace(global)?;
    let opts = VerifyOptions {
        strict: args.strict,
    };

    let report = verify(&ws, &ProcessEnv, &SystemExecutor, &opts)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.findings.is_empty() {
        eprintln!("    Verified {} extension(s), no findings", report.checked);
    } else {
        let color = !global.no_color && std::io::stderr().is_terminal();
        for finding in &report.findings {
            emit(&Diagnostic::warning(finding.to_string()), color);
        }
        eprintln!(
            "    Verified {} extension(s), {} finding(s)",
            report.checked,
            report.findings.len()
        );
    }

    Ok(())
}
