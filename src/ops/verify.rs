//! Link verification.
//!
//! The `link` lists in Extensions.toml are maintained by hand. This pass
//! reads the dynamic symbol tables of the built extensions with `nm` and
//! compares them against the declared sibling edges:
//!
//! - a *missing edge*: an extension needs symbols that only an undeclared
//!   sibling defines
//! - an *unused edge*: an extension links a sibling but needs none of its
//!   symbols
//!
//! Findings are advisory unless `--strict` is given.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::builder::toolchain::{locate_executable, EnvSource};
use crate::core::errors::BuildError;
use crate::core::graph::BuildPlan;
use crate::core::Workspace;
use crate::ops::build::resolve_plan;
use crate::util::diagnostic::suggestions;
use crate::util::process::{exec_and_check, Executor, ProcessBuilder};

/// Symbols shown per missing-edge finding.
const SYMBOL_SAMPLE: usize = 3;

/// Dynamic symbols of one shared object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    pub defined: BTreeSet<String>,
    pub undefined: BTreeSet<String>,
}

impl SymbolTable {
    /// Parse `nm -D` output.
    ///
    /// Defined lines carry an address (`0000000000012ab0 T _ZN5kaldi...`),
    /// undefined ones do not (`                 U _ZN5kaldi...`). Weak
    /// undefined references (`w`, `v`) are ignored.
    pub fn parse_nm(output: &str) -> Self {
        let mut table = SymbolTable::default();

        for line in output.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                ["U", name] => {
                    table.undefined.insert(strip_version(name));
                }
                [_addr, kind, name] if is_global_definition(kind) => {
                    table.defined.insert(strip_version(name));
                }
                _ => {}
            }
        }

        table
    }
}

fn is_global_definition(kind: &str) -> bool {
    matches!(
        kind,
        "T" | "D" | "B" | "R" | "V" | "W" | "G" | "S" | "u" | "i"
    )
}

/// `memcpy@GLIBC_2.14` -> `memcpy`
fn strip_version(name: &str) -> String {
    name.split('@').next().unwrap_or(name).to_string()
}

/// A mismatch between declared and actual link edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    MissingEdge {
        target: String,
        sibling: String,
        /// First few symbols the sibling would provide
        symbols: Vec<String>,
        count: usize,
    },
    UnusedEdge { target: String, sibling: String },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MissingEdge {
                target,
                sibling,
                symbols,
                count,
            } => write!(
                f,
                "`{}` uses {} symbol(s) from `{}` without linking it (e.g. {})",
                target,
                count,
                sibling,
                symbols.join(", ")
            ),
            Finding::UnusedEdge { target, sibling } => {
                write!(f, "`{}` links `{}` but uses none of its symbols", target, sibling)
            }
        }
    }
}

/// Compare declared sibling edges with symbol tables.
///
/// Symbols already satisfied by a declared sibling are not counted against
/// undeclared ones; each remaining symbol is attributed to the first
/// sibling in plan order that defines it.
pub fn check_edges(plan: &BuildPlan, tables: &HashMap<String, SymbolTable>) -> Vec<Finding> {
    let mut findings = Vec::new();

    for target in plan {
        let Some(table) = tables.get(&target.name) else {
            continue;
        };
        let declared: Vec<&str> = target.target_deps().collect();

        for sibling in &declared {
            let Some(provider) = tables.get(*sibling) else {
                continue;
            };
            if table.undefined.is_disjoint(&provider.defined) {
                findings.push(Finding::UnusedEdge {
                    target: target.name.clone(),
                    sibling: sibling.to_string(),
                });
            }
        }

        let unresolved: BTreeSet<&String> = table
            .undefined
            .iter()
            .filter(|sym| {
                !declared
                    .iter()
                    .filter_map(|d| tables.get(*d))
                    .any(|t| t.defined.contains(*sym))
            })
            .collect();

        let mut by_sibling: BTreeMap<usize, (&str, Vec<&String>)> = BTreeMap::new();
        for sym in unresolved {
            let provider = plan.iter().enumerate().find(|(_, other)| {
                other.name != target.name
                    && tables
                        .get(&other.name)
                        .is_some_and(|t| t.defined.contains(sym))
            });
            if let Some((index, other)) = provider {
                by_sibling
                    .entry(index)
                    .or_insert_with(|| (other.name.as_str(), Vec::new()))
                    .1
                    .push(sym);
            }
        }

        for (_, (sibling, symbols)) in by_sibling {
            findings.push(Finding::MissingEdge {
                target: target.name.clone(),
                sibling: sibling.to_string(),
                count: symbols.len(),
                symbols: symbols
                    .iter()
                    .take(SYMBOL_SAMPLE)
                    .map(|s| s.to_string())
                    .collect(),
            });
        }
    }

    findings
}

/// Options for the verify command.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Turn findings into an error
    pub strict: bool,
}

/// Result of a verification run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    /// Number of artifacts inspected
    pub checked: usize,
    pub findings: Vec<Finding>,
}

/// Verify the declared link edges of an existing build.
pub fn verify(
    ws: &Workspace,
    env: &dyn EnvSource,
    executor: &dyn Executor,
    opts: &VerifyOptions,
) -> Result<VerifyReport> {
    let nm = locate_executable(env, "nm", &["NM"])?;
    let plan = resolve_plan(ws, &[])?;
    let lib_dir = ws.lib_dir();

    let mut tables = HashMap::new();
    for target in &plan {
        let path = target.artifact_path(&lib_dir);
        if !path.is_file() {
            bail!(
                "extension `{}` has not been built ({} is missing)\n{}",
                target.name,
                path.display(),
                suggestions::NOT_BUILT
            );
        }

        let output = exec_and_check(executor, &ProcessBuilder::new(&nm).arg("-D").arg(&path))?;
        tables.insert(target.name.clone(), SymbolTable::parse_nm(&output.stdout));
    }

    let findings = check_edges(&plan, &tables);
    if opts.strict && !findings.is_empty() {
        // No report on failure; log the findings here.
        for finding in &findings {
            tracing::warn!("{}", finding);
        }
        return Err(BuildError::VerificationFailed {
            count: findings.len(),
        }
        .into());
    }

    Ok(VerifyReport {
        checked: tables.len(),
        findings,
    })
}
