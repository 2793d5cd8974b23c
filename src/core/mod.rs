//! Core data structures.
//!
//! - Build targets and the extension graph
//! - The `Extensions.toml` manifest
//! - Workspace layout
//! - Error types

pub mod errors;
pub mod graph;
pub mod manifest;
pub mod target;
pub mod workspace;

pub use errors::BuildError;
pub use graph::{BuildPlan, ExtensionGraph};
pub use manifest::{Manifest, MANIFEST_NAME};
pub use target::{BuildTarget, LinkDep};
pub use workspace::Workspace;
