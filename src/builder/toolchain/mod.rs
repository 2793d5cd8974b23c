//! Toolchain location.
//!
//! The toolchain is everything the build needs from outside this crate: the
//! CLIF interface compiler, the Kaldi installation it wraps, CMake, and the
//! Python interpreter the extensions are built for.
//!
//! Resolution order for executables:
//! 1. `PATH` search for the executable's usual name
//! 2. The executable's environment variable (`PYCLIF`, `CMAKE`, `PYTHON`)
//!
//! The environment is only ever read here, through an [`EnvSource`]. Every
//! other component receives the resolved [`ToolchainConfig`].

use std::path::{Path, PathBuf};

use serde::Serialize;

mod detect;

pub use detect::{locate_executable, query_numpy_include, require_env, ToolchainLocator};

/// Environment variables read by the locator.
pub mod vars {
    /// Interface compiler executable (fallback after a `PATH` search).
    pub const PYCLIF: &str = "PYCLIF";
    /// Kaldi installation root. Required.
    pub const KALDI_DIR: &str = "KALDI_DIR";
    /// CLIF install directory. Defaults to two levels above `pyclif`.
    pub const CLIF_DIR: &str = "CLIF_DIR";
    /// Debug build switch.
    pub const DEBUG: &str = "DEBUG";
    /// Extra flags for every compile.
    pub const CXX_FLAGS: &str = "CXX_FLAGS";
    /// CMake executable (fallback after a `PATH` search).
    pub const CMAKE: &str = "CMAKE";
    /// Python interpreter (fallback after a `PATH` search).
    pub const PYTHON: &str = "PYTHON";
    /// NumPy C headers; asked from the interpreter when unset.
    pub const NUMPY_INCLUDE_DIR: &str = "NUMPY_INCLUDE_DIR";
    /// Executable search path.
    pub const PATH: &str = "PATH";
}

/// Values of `DEBUG` that turn on a debug build.
pub const TRUTHY: &[&str] = &["ON", "1", "YES", "TRUE", "Y"];

/// Whether an environment value is one of [`TRUTHY`] (case-insensitive).
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(value))
}

/// Read access to the process environment.
pub trait EnvSource {
    /// Value of a variable. Empty values count as unset.
    fn var(&self, key: &str) -> Option<String>;

    /// Directory relative paths are resolved against.
    fn current_dir(&self) -> PathBuf;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn current_dir(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_default()
    }
}

/// Resolved toolchain. Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainConfig {
    /// The `pyclif` interface compiler
    pub pyclif: PathBuf,

    /// CLIF install directory (holds `python/runtime.cc` and friends)
    pub clif_dir: PathBuf,

    /// Kaldi installation root
    pub kaldi_dir: PathBuf,

    /// Kaldi sources (`$KALDI_DIR/src`)
    pub kaldi_src_dir: PathBuf,

    /// Kaldi shared libraries (`$KALDI_DIR/src/lib`)
    pub kaldi_lib_dir: PathBuf,

    /// CMake executable
    pub cmake: PathBuf,

    /// Python interpreter the extensions are built for
    pub python: PathBuf,

    /// NumPy C headers, if known
    pub numpy_include: Option<PathBuf>,

    /// Debug build requested through `DEBUG`
    pub debug: bool,

    /// Flags from `CXX_FLAGS`, already split
    pub cxx_flags: Vec<String>,
}

impl ToolchainConfig {
    /// Same configuration with the NumPy include directory filled in.
    pub fn with_numpy_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.numpy_include = Some(dir.into());
        self
    }

    /// Print the configuration, one `KEY: value` per line.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let show = |p: &Path| p.display().to_string();

        vec![
            ("PYCLIF", show(&self.pyclif)),
            ("CLIF_DIR", show(&self.clif_dir)),
            ("KALDI_DIR", show(&self.kaldi_dir)),
            ("KALDI_SRC_DIR", show(&self.kaldi_src_dir)),
            ("KALDI_LIB_DIR", show(&self.kaldi_lib_dir)),
            ("CMAKE", show(&self.cmake)),
            ("PYTHON", show(&self.python)),
            (
                "NUMPY_INCLUDE_DIR",
                self.numpy_include
                    .as_deref()
                    .map(show)
                    .unwrap_or_else(|| "(ask python)".to_string()),
            ),
            ("DEBUG", self.debug.to_string()),
            ("CXX_FLAGS", self.cxx_flags.join(" ")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for value in ["ON", "1", "YES", "TRUE", "Y", "on", "true", " yes "] {
            assert!(is_truthy(value), "{value:?} should be truthy");
        }
        for value in ["OFF", "0", "no", "", "enabled"] {
            assert!(!is_truthy(value), "{value:?} should not be truthy");
        }
    }
}
