//! CMake driver.
//!
//! Each extension is built as its own tiny CMake project: kaldiwrap writes a
//! `CMakeLists.txt` describing one `MODULE` library into
//! `build/temp/<name>/src`, configures it into `build/temp/<name>/cmake`,
//! and builds it. The artifact lands directly in the staged package tree.
//!
//! The interface wrappers themselves are produced by the project's own
//! top-level CMake project, which runs the CLIF compiler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::context::BuildContext;
use crate::core::target::BuildTarget;
use crate::util::fs::{ensure_dir, relative_path, write_if_changed};
use crate::util::process::{exec_and_check, Executor, ProcessBuilder};

/// Oldest CMake with `Development.Module` in FindPython3.
pub const CMAKE_MINIMUM_VERSION: &str = "3.18";

/// A sibling extension an artifact links against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingLink {
    pub name: String,
    /// Produced artifact of the sibling
    pub artifact: PathBuf,
}

/// CMake build adapter.
pub struct CMakeBuilder<'a> {
    ctx: &'a BuildContext,
    executor: &'a dyn Executor,
}

impl<'a> CMakeBuilder<'a> {
    pub fn new(ctx: &'a BuildContext, executor: &'a dyn Executor) -> Self {
        CMakeBuilder { ctx, executor }
    }

    /// Configure and build one extension. Returns the artifact path.
    pub fn build_extension(&self, target: &BuildTarget, siblings: &[SiblingLink]) -> Result<PathBuf> {
        let temp = self.ctx.temp_dir(&target.name);
        let source_dir = temp.join("src");
        let build_dir = temp.join("cmake");

        let listfile = self.render_cmakelists(target, siblings)?;
        if write_if_changed(&source_dir.join("CMakeLists.txt"), &listfile)? {
            tracing::debug!("wrote {}", source_dir.join("CMakeLists.txt").display());
        }
        ensure_dir(&build_dir)?;

        self.configure(&source_dir, &build_dir, &[])
            .with_context(|| format!("failed to configure extension `{}`", target.name))?;
        self.compile(&build_dir)
            .with_context(|| format!("failed to build extension `{}`", target.name))?;

        Ok(target.artifact_path(&self.ctx.lib_dir()))
    }

    /// Generate the interface wrappers by building the project's own CMake
    /// project into the build root.
    ///
    /// Returns `false` without running anything when the project has no
    /// top-level `CMakeLists.txt`.
    pub fn generate_wrappers(&self) -> Result<bool> {
        let project = &self.ctx.project_root;
        if !is_cmake_project(project) {
            tracing::info!(
                "{} has no CMakeLists.txt, skipping wrapper generation",
                project.display()
            );
            return Ok(false);
        }

        let tc = &self.ctx.toolchain;
        let defines = [
            format!("-DKALDI_DIR={}", tc.kaldi_dir.display()),
            format!("-DPYCLIF={}", tc.pyclif.display()),
            format!("-DCLIF_DIR={}", tc.clif_dir.display()),
        ];

        ensure_dir(&self.ctx.build_root)?;
        self.configure(project, &self.ctx.build_root, &defines)
            .context("failed to configure wrapper generation")?;
        self.compile(&self.ctx.build_root)
            .context("failed to generate interface wrappers")?;

        Ok(true)
    }

    /// Run CMake configuration.
    fn configure(&self, source_dir: &Path, build_dir: &Path, defines: &[String]) -> Result<()> {
        let mut cmd = ProcessBuilder::new(&self.ctx.toolchain.cmake)
            .arg("-S")
            .arg(source_dir)
            .arg("-B")
            .arg(build_dir)
            .args(defines)
            .arg(format!(
                "-DCMAKE_BUILD_TYPE={}",
                self.ctx.profile.build_type()
            ))
            .arg(format!(
                "-DPython3_EXECUTABLE={}",
                self.ctx.toolchain.python.display()
            ))
            .env("CXX_FLAGS", self.cxx_flags_env())
            .cwd(build_dir);

        if let Some(generator) = &self.ctx.generator {
            cmd = cmd.arg("-G").arg(generator);
        }

        if self.ctx.is_debug() {
            cmd = cmd.arg("-DCMAKE_VERBOSE_MAKEFILE:BOOL=ON");
        }

        exec_and_check(self.executor, &cmd)?;
        Ok(())
    }

    /// Run CMake build.
    fn compile(&self, build_dir: &Path) -> Result<()> {
        let mut cmd = ProcessBuilder::new(&self.ctx.toolchain.cmake)
            .arg("--build")
            .arg(build_dir)
            .arg("--config")
            .arg(self.ctx.profile.build_type())
            .arg("--parallel");

        if let Some(jobs) = self.ctx.jobs {
            cmd = cmd.arg(jobs.to_string());
        }

        exec_and_check(self.executor, &cmd)?;
        Ok(())
    }

    /// `CXX_FLAGS` handed to child CMake processes, with the version define.
    fn cxx_flags_env(&self) -> String {
        let mut flags = self
            .ctx
            .toolchain
            .cxx_flags
            .iter()
            .map(|f| shlex::try_quote(f).map(|q| q.into_owned()).unwrap_or_else(|_| f.clone()))
            .collect::<Vec<_>>();
        flags.push(format!("-D{}", self.ctx.version_define()));
        flags.join(" ")
    }

    /// Render the `CMakeLists.txt` of one extension.
    pub fn render_cmakelists(&self, target: &BuildTarget, siblings: &[SiblingLink]) -> Result<String> {
        let ctx = self.ctx;
        let name = &target.name;
        let artifact = target.artifact_path(&ctx.lib_dir());
        let output_dir = artifact
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| ctx.lib_dir());

        let sources = ctx.sources(target)?;
        let include_dirs = ctx.include_dirs(target)?;
        let rpaths = derive_rpaths(&output_dir, siblings, &ctx.rpaths()?);

        let mut link_dirs: Vec<PathBuf> = Vec::new();
        let mut link_items: Vec<String> = Vec::new();

        for (sibling, item) in siblings.iter().zip(sibling_link_items(siblings)) {
            if let Some(dir) = sibling.artifact.parent() {
                if !link_dirs.iter().any(|d| d == dir) {
                    link_dirs.push(dir.to_path_buf());
                }
            }
            link_items.push(item);
        }
        for dir in ctx.library_dirs()? {
            if !link_dirs.contains(&dir) {
                link_dirs.push(dir);
            }
        }
        link_items.extend(target.native_deps().map(str::to_string));

        let mut lines: Vec<String> = Vec::new();

        lines.push(format!("# Generated by kaldiwrap for `{}`. Do not edit.", target.module));
        lines.push(format!("cmake_minimum_required(VERSION {})", CMAKE_MINIMUM_VERSION));
        lines.push(format!("project({} LANGUAGES CXX)", name));
        lines.push(String::new());
        lines.push("find_package(Python3 REQUIRED COMPONENTS Development.Module)".to_string());
        lines.push(String::new());

        lines.push(format!("add_library({} MODULE", name));
        for source in &sources {
            lines.push(format!("    {}", quote_path(source)));
        }
        lines.push(")".to_string());
        lines.push(String::new());

        lines.push(format!("set_target_properties({} PROPERTIES", name));
        lines.push("    PREFIX \"\"".to_string());
        lines.push(format!("    OUTPUT_NAME {}", quote(&artifact_stem(target))));
        lines.push(format!("    SUFFIX \".{}\"", crate::core::target::EXTENSION_SUFFIX));
        lines.push(format!("    LIBRARY_OUTPUT_DIRECTORY {}", quote_path(&output_dir)));
        for config in ["DEBUG", "RELEASE"] {
            lines.push(format!(
                "    LIBRARY_OUTPUT_DIRECTORY_{} {}",
                config,
                quote_path(&output_dir)
            ));
        }
        lines.push(format!("    BUILD_RPATH {}", quote(&rpaths.join(";"))));
        lines.push(")".to_string());
        lines.push(String::new());

        lines.push(format!("target_include_directories({} PRIVATE", name));
        for dir in &include_dirs {
            lines.push(format!("    {}", quote_path(dir)));
        }
        lines.push(")".to_string());

        let compile_args = ctx.compile_args();
        if !compile_args.is_empty() {
            lines.push(format!("target_compile_options({} PRIVATE", name));
            for arg in &compile_args {
                lines.push(format!("    {}", quote(arg)));
            }
            lines.push(")".to_string());
        }

        lines.push(format!(
            "target_compile_definitions({} PRIVATE {})",
            name,
            quote(&ctx.version_define())
        ));

        if !link_dirs.is_empty() {
            lines.push(format!("target_link_directories({} PRIVATE", name));
            for dir in &link_dirs {
                lines.push(format!("    {}", quote_path(dir)));
            }
            lines.push(")".to_string());
        }

        lines.push(format!("target_link_libraries({} PRIVATE", name));
        for item in &link_items {
            lines.push(format!("    {}", quote(item)));
        }
        lines.push("    Python3::Module".to_string());
        lines.push(")".to_string());

        let link_args = ctx.link_args();
        if !link_args.is_empty() {
            lines.push(format!("target_link_options({} PRIVATE", name));
            for arg in &link_args {
                lines.push(format!("    {}", quote(arg)));
            }
            lines.push(")".to_string());
        }

        lines.push(String::new());
        Ok(lines.join("\n"))
    }
}

/// Check if a directory contains a CMake project.
pub fn is_cmake_project(dir: &Path) -> bool {
    dir.join("CMakeLists.txt").exists()
}

/// Runtime search paths of an artifact living in `artifact_dir`.
///
/// `$ORIGIN` and `$ORIGIN/..` come first, then one `$ORIGIN`-relative entry
/// per sibling directory, then the absolute paths from the manifest.
pub fn derive_rpaths(artifact_dir: &Path, siblings: &[SiblingLink], absolute: &[PathBuf]) -> Vec<String> {
    let mut rpaths = vec!["$ORIGIN".to_string(), "$ORIGIN/..".to_string()];

    let mut push = |entry: String| {
        if !rpaths.contains(&entry) {
            rpaths.push(entry);
        }
    };

    for sibling in siblings {
        let Some(dir) = sibling.artifact.parent() else {
            continue;
        };
        let rel = relative_path(artifact_dir, dir);
        if rel.as_os_str().is_empty() {
            push("$ORIGIN".to_string());
        } else {
            push(format!("$ORIGIN/{}", rel.display()));
        }
    }

    for dir in absolute {
        push(dir.display().to_string());
    }

    rpaths
}

/// Link items for sibling artifacts.
///
/// Siblings are linked by file name (`-l:kaldi_vector.so`) so the recorded
/// dependency stays relative and resolves through the rpath. Two siblings
/// sharing a file name cannot both be found that way; those are linked by
/// full path instead.
fn sibling_link_items(siblings: &[SiblingLink]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let file_name = |s: &SiblingLink| {
        s.artifact
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| s.name.clone())
    };

    let names: Vec<String> = siblings.iter().map(file_name).collect();
    for name in &names {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    siblings
        .iter()
        .zip(&names)
        .map(|(sibling, name)| {
            if counts.get(name.as_str()).copied().unwrap_or(0) > 1 {
                sibling.artifact.display().to_string()
            } else {
                format!("-l:{}", name)
            }
        })
        .collect()
}

fn artifact_stem(target: &BuildTarget) -> String {
    target
        .output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(target.name.as_str())
        .to_string()
}

/// Quote a CMake argument.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy().replace('\\', "/"))
}
