//! High-level operations.
//!
//! This module contains the implementation of kaldiwrap commands.

pub mod build;
pub mod clean;
pub mod stage;
pub mod verify;

pub use build::{build, resolve_plan, BuildOptions, BuildResult};
pub use clean::clean;
pub use stage::{install, stage, StageReport};
pub use verify::{verify, VerifyOptions, VerifyReport};
