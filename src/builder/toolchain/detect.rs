//! Toolchain detection functions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::errors::BuildError;
use crate::util::process::{exec_and_check, Executor, ProcessBuilder};

use super::{is_truthy, vars, EnvSource, ToolchainConfig};

/// Locate an executable.
///
/// Searches `PATH` for `name` first, then tries each fallback variable in
/// order. A fallback value may be a path (absolute or relative to the
/// current directory) or a bare name looked up on `PATH`.
pub fn locate_executable(
    env: &dyn EnvSource,
    name: &str,
    fallbacks: &[&str],
) -> Result<PathBuf, BuildError> {
    let cwd = env.current_dir();
    let path_var = env.var(vars::PATH);
    let mut checked = vec![vars::PATH.to_string()];

    if let Some(paths) = path_var.as_deref() {
        if let Ok(found) = which::which_in(name, Some(paths), &cwd) {
            tracing::debug!("found `{}` on PATH at {}", name, found.display());
            return Ok(absolute(&cwd, found));
        }
    }

    for var in fallbacks {
        checked.push(format!("${}", var));

        let Some(value) = env.var(var) else {
            continue;
        };

        match resolve_candidate(&value, path_var.as_deref(), &cwd) {
            Some(found) => {
                tracing::debug!("found `{}` through ${} at {}", name, var, found.display());
                return Ok(found);
            }
            None => tracing::warn!("${} is set to `{}`, which is not an executable", var, value),
        }
    }

    Err(BuildError::ToolNotFound {
        tool: name.to_string(),
        checked,
    })
}

fn resolve_candidate(value: &str, path_var: Option<&str>, cwd: &Path) -> Option<PathBuf> {
    let candidate = Path::new(value);

    if candidate.is_absolute() || candidate.components().count() > 1 {
        let candidate = absolute(cwd, candidate.to_path_buf());
        return is_executable(&candidate).then_some(candidate);
    }

    let paths = path_var?;
    which::which_in(value, Some(paths), cwd)
        .ok()
        .map(|found| absolute(cwd, found))
}

fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Read a required variable.
pub fn require_env(env: &dyn EnvSource, var: &str) -> Result<String, BuildError> {
    env.var(var).ok_or_else(|| BuildError::MissingConfiguration {
        var: var.to_string(),
        reason: "is not set".to_string(),
    })
}

/// Builds a [`ToolchainConfig`] from an environment.
pub struct ToolchainLocator<'a> {
    env: &'a dyn EnvSource,
}

impl<'a> ToolchainLocator<'a> {
    pub fn new(env: &'a dyn EnvSource) -> Self {
        ToolchainLocator { env }
    }

    /// Whether `DEBUG` asks for a debug build.
    ///
    /// Answered without locating anything, so logging can be set up before
    /// the toolchain is known to be complete.
    pub fn debug_requested(&self) -> bool {
        self.env
            .var(vars::DEBUG)
            .is_some_and(|value| is_truthy(&value))
    }

    /// Resolve every tool and directory the build needs.
    ///
    /// Fails on the first missing piece; nothing is cached between calls.
    pub fn locate(&self) -> Result<ToolchainConfig, BuildError> {
        let pyclif = locate_executable(self.env, "pyclif", &[vars::PYCLIF])?;

        let kaldi_dir = self.require_dir(vars::KALDI_DIR)?;
        let kaldi_src_dir = kaldi_dir.join("src");
        let kaldi_lib_dir = kaldi_src_dir.join("lib");

        let clif_dir = match self.env.var(vars::CLIF_DIR) {
            Some(dir) => self.resolve(&dir),
            None => {
                let dir = pyclif
                    .parent()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("/"));
                tracing::info!("CLIF_DIR is not set, using {}", dir.display());
                dir
            }
        };

        let cmake = locate_executable(self.env, "cmake", &[vars::CMAKE])?;

        let python = match locate_executable(self.env, "python3", &[vars::PYTHON]) {
            Ok(python) => python,
            Err(_) => locate_executable(self.env, "python", &[vars::PYTHON])?,
        };

        let numpy_include = self
            .env
            .var(vars::NUMPY_INCLUDE_DIR)
            .map(|dir| self.resolve(&dir));

        let debug = self.debug_requested();

        let cxx_flags = match self.env.var(vars::CXX_FLAGS) {
            Some(flags) => {
                shlex::split(&flags).ok_or_else(|| BuildError::InvalidConfiguration {
                    var: vars::CXX_FLAGS.to_string(),
                    reason: "has unbalanced quotes".to_string(),
                })?
            }
            None => Vec::new(),
        };

        let config = ToolchainConfig {
            pyclif,
            clif_dir,
            kaldi_dir,
            kaldi_src_dir,
            kaldi_lib_dir,
            cmake,
            python,
            numpy_include,
            debug,
            cxx_flags,
        };

        if config.debug {
            for (key, value) in config.describe() {
                tracing::info!("{}: {}", key, value);
            }
        }

        Ok(config)
    }

    fn require_dir(&self, var: &str) -> Result<PathBuf, BuildError> {
        let value = require_env(self.env, var)?;
        let dir = self.resolve(&value);

        if !dir.is_dir() {
            return Err(BuildError::MissingConfiguration {
                var: var.to_string(),
                reason: format!("points to `{}`, which is not a directory", dir.display()),
            });
        }

        Ok(dir)
    }

    fn resolve(&self, value: &str) -> PathBuf {
        absolute(&self.env.current_dir(), PathBuf::from(value))
    }
}

/// Fill in the NumPy include directory by asking the interpreter.
///
/// Returns the configuration unchanged when the directory is already known.
pub fn query_numpy_include(
    config: ToolchainConfig,
    executor: &dyn Executor,
) -> Result<ToolchainConfig> {
    if config.numpy_include.is_some() {
        return Ok(config);
    }

    let query = ProcessBuilder::new(&config.python)
        .arg("-c")
        .arg("import numpy; print(numpy.get_include())");

    let output = exec_and_check(executor, &query)
        .context("failed to ask the Python interpreter for NumPy's include directory")?;

    let dir = output.stdout.trim();
    if dir.is_empty() {
        return Err(BuildError::MissingConfiguration {
            var: vars::NUMPY_INCLUDE_DIR.to_string(),
            reason: "is not set and the interpreter reported no NumPy include directory"
                .to_string(),
        }
        .into());
    }

    tracing::debug!("NumPy include directory: {}", dir);
    Ok(config.with_numpy_include(dir))
}
