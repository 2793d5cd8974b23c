//! `kaldiwrap plan` command

use anyhow::Result;
use serde::Serialize;

use crate::cli::{GlobalArgs, PlanArgs};
use kaldiwrap::core::target::LinkDep;
use kaldiwrap::ops::build::resolve_plan;

#[derive(Serialize)]
struct PlanStep<'a> {
    name: &'a str,
    module: &'a str,
    output: String,
    link: &'a [LinkDep],
}

pub fn execute(global: &GlobalArgs, args: PlanArgs) -> Result<()> {
    let ws = super::workspace(global)?;
    let plan = resolve_plan(&ws, &args.targets)?;
    let lib_dir = ws.lib_dir();

    if args.json {
        let steps: Vec<PlanStep<'_>> = plan
            .iter()
            .map(|t| PlanStep {
                name: &t.name,
                module: &t.module,
                output: t.artifact_path(&lib_dir).display().to_string(),
                link: &t.link,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    let width = plan.len().to_string().len();
    for (i, target) in plan.iter().enumerate() {
        let links: Vec<String> = target.link.iter().map(|l| l.to_string()).collect();
        if links.is_empty() {
            println!("{:>width$}. {}", i + 1, target.name, width = width);
        } else {
            println!(
                "{:>width$}. {} ({})",
                i + 1,
                target.name,
                links.join(", "),
                width = width
            );
        }
    }

    Ok(())
}
