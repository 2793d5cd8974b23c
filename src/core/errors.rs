//! Build error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Fatal error raised while locating the toolchain, loading the extension
/// graph, or driving the external build.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("missing configuration: `{var}` {reason}")]
    #[diagnostic(code(kaldiwrap::config::missing))]
    MissingConfiguration { var: String, reason: String },

    #[error("invalid configuration: `{var}` {reason}")]
    #[diagnostic(code(kaldiwrap::config::invalid))]
    InvalidConfiguration { var: String, reason: String },

    #[error("`{tool}` not found (checked {})", .checked.join(", "))]
    #[diagnostic(code(kaldiwrap::toolchain::not_found))]
    ToolNotFound { tool: String, checked: Vec<String> },

    #[error("cyclic dependency in extension graph: {}", .cycle.join(" -> "))]
    #[diagnostic(code(kaldiwrap::graph::cycle))]
    CyclicDependency { cycle: Vec<String> },

    #[error("extension `{target}` links against unknown library `{dependency}`")]
    #[diagnostic(code(kaldiwrap::graph::unknown_dependency))]
    UnknownDependency { target: String, dependency: String },

    #[error("extension `{name}` is declared more than once")]
    #[diagnostic(code(kaldiwrap::graph::duplicate))]
    DuplicateTarget { name: String },

    #[error("no extension named `{name}`")]
    #[diagnostic(code(kaldiwrap::graph::unknown_target))]
    UnknownTarget { name: String },

    #[error("invalid extension `{name}`: {reason}")]
    #[diagnostic(code(kaldiwrap::graph::invalid))]
    InvalidTarget { name: String, reason: String },

    #[error("`{command}` failed with {}", describe_status(.status))]
    #[diagnostic(code(kaldiwrap::process::failed))]
    ExternalProcessFailure {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("extension module `{module}` has no Python package `{package}` to live in")]
    #[diagnostic(code(kaldiwrap::stage::orphan))]
    OrphanExtension { module: String, package: String },

    #[error("link verification found {count} problem(s)")]
    #[diagnostic(code(kaldiwrap::verify::failed))]
    VerificationFailed { count: usize },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl BuildError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());

        match self {
            BuildError::MissingConfiguration { var, .. } => diag.with_suggestion(format!(
                "Set `{}` before running kaldiwrap, e.g. `export {}=/path/to/kaldi`",
                var, var
            )),

            BuildError::InvalidConfiguration { var, .. } => {
                diag.with_suggestion(format!("Fix or unset `{}`", var))
            }

            BuildError::ToolNotFound { tool, checked } => {
                let mut diag = diag;
                for place in checked {
                    diag = diag.with_context(format!("looked in {}", place));
                }
                diag.with_suggestion(format!(
                    "Install `{}` or point one of the variables above at it",
                    tool
                ))
            }

            BuildError::CyclicDependency { cycle } => diag
                .with_context(format!("cycle: {}", cycle.join(" -> ")))
                .with_suggestion(
                    "Remove one of the `link` entries on the cycle in Extensions.toml".to_string(),
                ),

            BuildError::UnknownDependency { dependency, .. } => diag.with_suggestion(format!(
                "Declare `{}` as an [[extension]] or list it under [native] libraries",
                dependency
            )),

            BuildError::DuplicateTarget { .. } => {
                diag.with_suggestion("Give every [[extension]] a unique name".to_string())
            }

            BuildError::UnknownTarget { .. } => diag.with_suggestion(
                "Run `kaldiwrap plan` to list the available extensions".to_string(),
            ),

            BuildError::InvalidTarget { .. } => diag,

            BuildError::ExternalProcessFailure { stdout, stderr, .. } => {
                let mut diag = diag;
                for line in stdout.lines().chain(stderr.lines()) {
                    diag = diag.with_context(line.to_string());
                }
                diag.with_suggestion(
                    "Fix the reported error and re-run the whole build".to_string(),
                )
            }

            BuildError::OrphanExtension { package, .. } => diag.with_suggestion(format!(
                "Create the package directory for `{}` with an `__init__.py`",
                package
            )),

            BuildError::VerificationFailed { .. } => diag.with_suggestion(
                "Update the `link` lists in Extensions.toml to match the reported symbols"
                    .to_string(),
            ),
        }
    }
}
