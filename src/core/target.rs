//! Build target definitions.
//!
//! A `BuildTarget` is one Python extension module: a shared object compiled
//! from CLIF-generated (or hand written) C++ sources and linked against
//! sibling extensions and Kaldi's own libraries.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::BuildError;

/// File extension of every extension module artifact.
pub const EXTENSION_SUFFIX: &str = "so";

/// A single link dependency of a build target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum LinkDep {
    /// Another extension module built earlier in the plan.
    Target(String),
    /// A library of the native toolkit (`-lkaldi-matrix`).
    Native(String),
}

impl fmt::Display for LinkDep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDep::Target(name) => write!(f, "{}", name),
            LinkDep::Native(name) => write!(f, "-l{}", name),
        }
    }
}

/// A shared-object build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    /// Target name, unique within the graph (e.g. `kaldi_vector`)
    pub name: String,

    /// Dotted Python module path (e.g. `kaldi.matrix.kaldi_vector`)
    pub module: String,

    /// Source files, in compilation order
    pub sources: Vec<PathBuf>,

    /// Target-specific include directories, searched before the global ones
    pub include_dirs: Vec<PathBuf>,

    /// Link dependencies, in link order
    pub link: Vec<LinkDep>,

    /// Artifact path relative to the library output directory
    pub output: PathBuf,
}

impl BuildTarget {
    /// Create a target with no sources or dependencies.
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Result<Self, BuildError> {
        let name = name.into();
        let module = module.into();

        validate_name(&name)?;
        let output = module_output_path(&name, &module)?;

        Ok(BuildTarget {
            name,
            module,
            sources: Vec::new(),
            include_dirs: Vec::new(),
            link: Vec::new(),
            output,
        })
    }

    /// Add source files.
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    /// Add include directories.
    pub fn with_include_dirs(
        mut self,
        dirs: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.include_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Add a link dependency.
    pub fn with_link(mut self, dep: LinkDep) -> Self {
        if !self.link.contains(&dep) {
            self.link.push(dep);
        }
        self
    }

    /// Names of sibling targets this target links against.
    pub fn target_deps(&self) -> impl Iterator<Item = &str> {
        self.link.iter().filter_map(|dep| match dep {
            LinkDep::Target(name) => Some(name.as_str()),
            LinkDep::Native(_) => None,
        })
    }

    /// Native toolkit libraries this target links against.
    pub fn native_deps(&self) -> impl Iterator<Item = &str> {
        self.link.iter().filter_map(|dep| match dep {
            LinkDep::Native(name) => Some(name.as_str()),
            LinkDep::Target(_) => None,
        })
    }

    /// Dotted name of the Python package holding this module (`kaldi.matrix`).
    pub fn package(&self) -> &str {
        self.module
            .rsplit_once('.')
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    /// Artifact location under the given library output directory.
    pub fn artifact_path(&self, lib_dir: &Path) -> PathBuf {
        lib_dir.join(&self.output)
    }
}

fn validate_name(name: &str) -> Result<(), BuildError> {
    if name.is_empty() {
        return Err(BuildError::InvalidTarget {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BuildError::InvalidTarget {
            name: name.to_string(),
            reason: "name may only contain ASCII letters, digits, `_` and `-`".to_string(),
        });
    }

    Ok(())
}

/// `kaldi.matrix.kaldi_vector` -> `kaldi/matrix/kaldi_vector.so`
fn module_output_path(name: &str, module: &str) -> Result<PathBuf, BuildError> {
    let segments: Vec<&str> = module.split('.').collect();

    let valid_segment = |s: &&str| {
        !s.is_empty()
            && !s.starts_with(|c: char| c.is_ascii_digit())
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    if segments.len() < 2 || !segments.iter().all(valid_segment) {
        return Err(BuildError::InvalidTarget {
            name: name.to_string(),
            reason: format!(
                "`{}` is not a dotted Python module path inside a package",
                module
            ),
        });
    }

    let mut path: PathBuf = segments.iter().collect();
    path.set_extension(EXTENSION_SUFFIX);
    Ok(path)
}
