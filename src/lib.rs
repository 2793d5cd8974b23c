//! kaldiwrap - builds the Python extension modules of a CLIF-wrapped Kaldi
//!
//! This crate provides the library side of the `kaldiwrap` tool: toolchain
//! discovery, the extension dependency graph, the per-extension CMake
//! driver and package staging.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for kaldiwrap unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests.
#[cfg(test)]
pub mod test_support;

pub use core::{
    graph::{BuildPlan, ExtensionGraph},
    manifest::Manifest,
    target::BuildTarget,
    workspace::Workspace,
};

pub use util::context::GlobalContext;
