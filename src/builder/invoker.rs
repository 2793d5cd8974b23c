//! Native build invoker.
//!
//! Walks a [`BuildPlan`] strictly in order, building one extension at a
//! time through CMake. The first failure stops the walk; nothing after the
//! failing target is attempted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::builder::cmake::{CMakeBuilder, SiblingLink};
use crate::builder::context::BuildContext;
use crate::core::graph::BuildPlan;
use crate::core::target::BuildTarget;
use crate::util::process::Executor;

/// A built extension module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub module: String,

    /// Dotted package the module belongs to
    pub package: String,

    pub path: PathBuf,
}

impl Artifact {
    pub fn new(target: &BuildTarget, path: PathBuf) -> Self {
        Artifact {
            name: target.name.clone(),
            module: target.module.clone(),
            package: target.package().to_string(),
            path,
        }
    }
}

/// Drives the external build for every step of a plan.
pub struct NativeBuildInvoker<'a> {
    ctx: &'a BuildContext,
    executor: &'a dyn Executor,
    progress: bool,
}

impl<'a> NativeBuildInvoker<'a> {
    pub fn new(ctx: &'a BuildContext, executor: &'a dyn Executor) -> Self {
        NativeBuildInvoker {
            ctx,
            executor,
            progress: false,
        }
    }

    /// Show a progress bar while building.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Build every target of the plan, in plan order.
    ///
    /// Each target is linked against the artifacts already produced for its
    /// sibling dependencies. Returns the artifacts in build order.
    pub fn execute(&self, plan: &BuildPlan) -> Result<Vec<Artifact>> {
        let start = Instant::now();
        let cmake = CMakeBuilder::new(self.ctx, self.executor);
        let pb = self.progress_bar(plan.len());

        let mut built: HashMap<&str, PathBuf> = HashMap::new();
        let mut artifacts = Vec::with_capacity(plan.len());

        for (index, target) in plan.iter().enumerate() {
            if let Some(pb) = &pb {
                pb.set_message(target.name.clone());
            }
            tracing::info!(
                "building `{}` ({}/{})",
                target.module,
                index + 1,
                plan.len()
            );

            let mut siblings = Vec::new();
            for dep in target.target_deps() {
                let Some(artifact) = built.get(dep) else {
                    bail!(
                        "extension `{}` links `{}`, which has not been built yet",
                        target.name,
                        dep
                    );
                };
                siblings.push(SiblingLink {
                    name: dep.to_string(),
                    artifact: artifact.clone(),
                });
            }

            let path = match cmake.build_extension(target, &siblings) {
                Ok(path) => path,
                Err(e) => {
                    if let Some(pb) = &pb {
                        pb.abandon_with_message(format!("`{}` failed", target.name));
                    }
                    tracing::error!(
                        "stopping after `{}`; {} extension(s) not attempted",
                        target.name,
                        plan.len() - index - 1
                    );
                    return Err(e);
                }
            };

            built.insert(target.name.as_str(), path.clone());
            artifacts.push(Artifact::new(target, path));

            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        tracing::info!(
            "built {} extension(s) in {:.2}s",
            artifacts.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(artifacts)
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.progress || total < 2 {
            return None;
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::BuildError;
    use crate::core::manifest::Manifest;
    use crate::test_support::{test_context, MockExecutor, MockProcessOutput};
    use tempfile::TempDir;

    #[test]
    fn test_builds_in_plan_order() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path());
        let graph = Manifest::builtin().unwrap().to_graph().unwrap();
        let plan = graph.resolve_subset(&["kaldi_matrix"]).unwrap();

        let executor = MockExecutor::new();
        executor.set_default(MockProcessOutput::success(""));

        let artifacts = NativeBuildInvoker::new(&ctx, &executor)
            .execute(&plan)
            .unwrap();

        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, plan.names());
        assert_eq!(names[0], "_clif");
        assert_eq!(
            artifacts.last().unwrap().path,
            ctx.lib_dir().join("kaldi/matrix/kaldi_matrix.so")
        );

        // configure + build per target
        assert_eq!(executor.calls().len(), plan.len() * 2);

        let listfile = std::fs::read_to_string(
            ctx.temp_dir("kaldi_matrix").join("src/CMakeLists.txt"),
        )
        .unwrap();
        assert!(listfile.contains("-l:kaldi_vector.so"));
        assert!(listfile.contains("-l:matrix_common.so"));
        assert!(listfile.contains("-l:_clif.so"));
    }

    #[test]
    fn test_stops_at_first_failure() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path());
        let graph = Manifest::builtin().unwrap().to_graph().unwrap();
        let plan = graph.resolve_subset(&["kaldi_matrix"]).unwrap();
        assert_eq!(plan.names(), vec!["_clif", "matrix_common", "kaldi_vector", "kaldi_matrix"]);

        let executor = MockExecutor::new();
        executor.expect_contains(
            "temp/matrix_common/cmake --config",
            MockProcessOutput::failure(2, "matrix-common-clifwrap.cc:1: error"),
        );
        executor.set_default(MockProcessOutput::success(""));

        let err = NativeBuildInvoker::new(&ctx, &executor)
            .execute(&plan)
            .unwrap_err();

        let build_err = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(
            build_err,
            BuildError::ExternalProcessFailure { status: Some(2), .. }
        ));
        assert!(format!("{:#}", err).contains("matrix_common"));

        // _clif (2) + matrix_common (2), nothing for kaldi_vector onwards
        let calls = executor.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| !c.contains("kaldi_vector")));
        assert!(!ctx.temp_dir("kaldi_vector").exists());
    }
}
