//! Native extension builds.
//!
//! This module locates the external toolchain and drives CMake for each
//! extension of a build plan.

pub mod cmake;
pub mod context;
pub mod invoker;
pub mod toolchain;

pub use cmake::CMakeBuilder;
pub use context::{BuildContext, Profile};
pub use invoker::{Artifact, NativeBuildInvoker};
pub use toolchain::{ProcessEnv, ToolchainConfig, ToolchainLocator};
