//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// kaldiwrap - builds the Python extension modules of CLIF-wrapped Kaldi
#[derive(Parser)]
#[command(name = "kaldiwrap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to Extensions.toml (defaults to discovery, then the bundled set)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Build directory (defaults to `build` under the project root)
    #[arg(long, global = true, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate wrappers, build every extension and stage the package
    Build(BuildArgs),

    /// Show the build order without building
    Plan(PlanArgs),

    /// Show the located toolchain
    Toolchain(ToolchainArgs),

    /// Stage an existing build into build/lib
    Stage,

    /// Copy the staged package to a directory
    Install(InstallArgs),

    /// Check declared link edges against the built extensions
    Verify(VerifyArgs),

    /// Remove the build directory
    Clean,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build with debug flags regardless of DEBUG
    #[arg(long)]
    pub debug: bool,

    /// Build only these extensions (and what they link against)
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Number of parallel jobs per CMake build
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Do not run wrapper generation
    #[arg(long)]
    pub skip_wrappers: bool,

    /// Do not show a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Plan only these extensions (and what they link against)
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Emit the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ToolchainArgs {
    /// Ask Python for the NumPy include directory
    #[arg(long)]
    pub numpy: bool,

    /// Emit the toolchain as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Destination directory (e.g. a site-packages directory)
    #[arg(long, value_name = "DIR")]
    pub dest: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Fail when any finding is reported
    #[arg(long)]
    pub strict: bool,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
