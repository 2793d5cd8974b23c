//! Package assembly.
//!
//! Discovers the Python packages of the project (directories holding an
//! `__init__.py` under the package root) and stages them next to the built
//! extension modules, so `build/lib` is an importable, installable tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::builder::invoker::Artifact;
use crate::core::errors::BuildError;
use crate::core::graph::BuildPlan;
use crate::core::Workspace;
use crate::util::diagnostic::suggestions;
use crate::util::fs::{copy_dir_all, copy_file, ensure_dir};

/// Marker file of a Python package directory.
pub const PACKAGE_MARKER: &str = "__init__.py";

/// A discovered Python package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PythonPackage {
    /// Dotted name (`kaldi.matrix`)
    pub name: String,

    /// Source directory
    pub dir: PathBuf,

    /// Directory relative to the import root (`kaldi/matrix`)
    pub rel: PathBuf,
}

/// Outcome of staging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub packages: Vec<PythonPackage>,

    /// Python sources copied into the staged tree
    pub python_files: usize,

    /// Extension modules, keyed by dotted module name
    pub extensions: BTreeMap<String, PathBuf>,
}

/// Find every package under the package root directory.
///
/// The directory holding the package root is the import root, so with
/// `package_root = "python/kaldi"` the top package is still `kaldi`.
/// A directory without a marker ends its branch: nested directories below
/// it are not packages even if they carry a marker.
pub fn discover_packages(top: &Path) -> Result<Vec<PythonPackage>> {
    if !top.join(PACKAGE_MARKER).is_file() {
        return Ok(Vec::new());
    }
    let import_root = top.parent().unwrap_or(top).to_path_buf();

    let mut packages = Vec::new();
    let walker = WalkDir::new(top)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.file_type().is_dir()
                && !e.file_name().to_string_lossy().starts_with('.')
                && e.file_name() != "__pycache__"
                && e.path().join(PACKAGE_MARKER).is_file()
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to scan {}", top.display()))?;
        let rel = entry.path().strip_prefix(&import_root)?.to_path_buf();
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(".");

        packages.push(PythonPackage {
            name,
            dir: entry.into_path(),
            rel,
        });
    }

    Ok(packages)
}

/// Artifacts a completed build of `plan` leaves in `lib_dir`.
pub fn expected_artifacts(plan: &BuildPlan, lib_dir: &Path) -> Vec<Artifact> {
    plan.iter()
        .map(|target| Artifact::new(target, target.artifact_path(lib_dir)))
        .collect()
}

/// Stage the package tree into the workspace's `build/lib`.
///
/// Every artifact must belong to a discovered package and must exist.
/// Running twice yields the same tree.
pub fn stage(ws: &Workspace, artifacts: &[Artifact]) -> Result<StageReport> {
    let lib_dir = ws.lib_dir();
    let packages = discover_packages(&ws.package_dir())?;

    let mut extensions = BTreeMap::new();
    for artifact in artifacts {
        let Some(owner) = packages.iter().find(|p| p.name == artifact.package) else {
            return Err(BuildError::OrphanExtension {
                module: artifact.module.clone(),
                package: artifact.package.clone(),
            }
            .into());
        };

        if !artifact.path.is_file() {
            bail!(
                "extension `{}` was not built: {} is missing\n{}",
                artifact.name,
                artifact.path.display(),
                suggestions::NOT_BUILT
            );
        }

        let file_name = artifact
            .path
            .file_name()
            .with_context(|| format!("artifact has no file name: {}", artifact.path.display()))?;
        let staged = lib_dir.join(&owner.rel).join(file_name);
        if staged != artifact.path {
            copy_file(&artifact.path, &staged)?;
        }

        tracing::debug!("{} -> {}", artifact.module, staged.display());
        extensions.insert(artifact.module.clone(), staged);
    }

    let mut python_files = 0;
    for package in &packages {
        let dest = lib_dir.join(&package.rel);
        ensure_dir(&dest)?;

        for entry in std::fs::read_dir(&package.dir)
            .with_context(|| format!("failed to read directory: {}", package.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "py") {
                if let Some(name) = path.file_name() {
                    copy_file(&path, &dest.join(name))?;
                    python_files += 1;
                }
            }
        }
    }

    tracing::info!(
        "staged {} package(s), {} Python file(s), {} extension(s) into {}",
        packages.len(),
        python_files,
        extensions.len(),
        lib_dir.display()
    );

    Ok(StageReport {
        packages,
        python_files,
        extensions,
    })
}

/// Copy the staged tree to `dest`. Returns the number of files copied.
pub fn install(ws: &Workspace, dest: &Path) -> Result<usize> {
    let lib_dir = ws.lib_dir();
    if !lib_dir.is_dir() {
        bail!(
            "nothing is staged at {}\n{}",
            lib_dir.display(),
            suggestions::NOT_BUILT
        );
    }

    let copied = copy_dir_all(&lib_dir, dest)?;
    tracing::info!("installed {} file(s) into {}", copied, dest.display());
    Ok(copied)
}
