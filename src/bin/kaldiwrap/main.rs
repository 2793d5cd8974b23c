//! kaldiwrap CLI - builds the Python extension modules of CLIF-wrapped Kaldi

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kaldiwrap::builder::toolchain::{ProcessEnv, ToolchainLocator};
use kaldiwrap::core::errors::BuildError;
use kaldiwrap::util::diagnostic::{emit, suggestions};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.global.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let debug = ToolchainLocator::new(&ProcessEnv).debug_requested();
    let filter = EnvFilter::try_from_env("KALDIWRAP_LOG").unwrap_or_else(|_| {
        if cli.global.verbose || debug {
            EnvFilter::new("kaldiwrap=debug")
        } else {
            EnvFilter::new("kaldiwrap=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = cli.global;
    match cli.command {
        Commands::Build(args) => commands::build::execute(&global, args),
        Commands::Plan(args) => commands::plan::execute(&global, args),
        Commands::Toolchain(args) => commands::toolchain::execute(args),
        Commands::Stage => commands::stage::execute(&global),
        Commands::Install(args) => commands::install::execute(&global, args),
        Commands::Verify(args) => commands::verify::execute(&global, args),
        Commands::Clean => commands::clean::execute(&global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error, as a diagnostic when a `BuildError` is at its root.
fn report(err: &anyhow::Error, color: bool) {
    let Some(build_err) = err.chain().find_map(|e| e.downcast_ref::<BuildError>()) else {
        eprintln!("error: {:#}", err);
        return;
    };

    let mut diag = build_err.to_diagnostic();
    for cause in err
        .chain()
        .take_while(|e| e.downcast_ref::<BuildError>().is_none())
    {
        diag = diag.with_context(cause.to_string());
    }
    if matches!(build_err, BuildError::ExternalProcessFailure { .. }) {
        diag = diag.with_suggestion(suggestions::BUILD_FAILED.trim_start_matches("help: "));
    }

    emit(&diag, color);
}
