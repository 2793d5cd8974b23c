//! Implementation of `kaldiwrap build`.

use anyhow::Result;
use serde::Serialize;

use crate::builder::cmake::CMakeBuilder;
use crate::builder::context::{BuildContext, Profile};
use crate::builder::invoker::{Artifact, NativeBuildInvoker};
use crate::builder::toolchain::{query_numpy_include, EnvSource, ToolchainLocator};
use crate::core::graph::BuildPlan;
use crate::core::Workspace;
use crate::ops::stage::{stage, StageReport};
use crate::util::process::Executor;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Force a debug build regardless of `DEBUG`
    pub debug: bool,

    /// Parallel jobs for each CMake build (overrides config)
    pub jobs: Option<usize>,

    /// Do not run the wrapper generation step
    pub skip_wrappers: bool,

    /// Build only these extensions and what they link against
    pub targets: Vec<String>,

    /// Show a progress bar
    pub progress: bool,
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub artifacts: Vec<Artifact>,
    pub staged: StageReport,
    pub debug: bool,
}

/// Validate the manifest's graph and order it.
///
/// With no target names the whole graph is planned.
pub fn resolve_plan(ws: &Workspace, targets: &[String]) -> Result<BuildPlan> {
    let graph = ws.manifest().to_graph()?;

    let plan = if targets.is_empty() {
        graph.resolve_order()?
    } else {
        graph.resolve_subset(targets)?
    };

    Ok(plan)
}

/// Execute the build pipeline.
///
/// 1. Locate the toolchain (environment only, no processes)
/// 2. Validate and order the extension graph
/// 3. Ask Python for NumPy's headers if the manifest needs them
/// 4. Generate the interface wrappers
/// 5. Build every extension in plan order
/// 6. Stage the package tree
pub fn build(
    ws: &Workspace,
    env: &dyn EnvSource,
    executor: &dyn Executor,
    opts: &BuildOptions,
) -> Result<BuildResult> {
    let toolchain = ToolchainLocator::new(env).locate()?;
    let plan = resolve_plan(ws, &opts.targets)?;
    tracing::debug!("build order: {}", plan.names().join(", "));

    let toolchain = if ws.manifest().references("numpy_include") {
        query_numpy_include(toolchain, executor)?
    } else {
        toolchain
    };

    let mut ctx = BuildContext::new(ws, toolchain).with_jobs(opts.jobs);
    if opts.debug {
        ctx = ctx.with_profile(Profile::Debug);
    }
    tracing::info!(
        "building {} extension(s) ({})",
        plan.len(),
        ctx.profile.build_type()
    );

    if opts.skip_wrappers {
        tracing::info!("skipping wrapper generation");
    } else {
        CMakeBuilder::new(&ctx, executor).generate_wrappers()?;
    }

    let artifacts = NativeBuildInvoker::new(&ctx, executor)
        .progress(opts.progress)
        .execute(&plan)?;

    let staged = stage(ws, &artifacts)?;

    Ok(BuildResult {
        artifacts,
        staged,
        debug: ctx.is_debug(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::BuildError;
    use crate::core::manifest::MANIFEST_NAME;
    use crate::test_support::{
        fake_install, workspace_at, write_file, MockExecutor, MockProcessOutput,
    };
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[build]
package = "pykaldi"
version = "0.0.1"
include_dirs = ["{kaldi_src}"]

[native]
libraries = ["kaldi-matrix"]

[[extension]]
name = "kaldi_vector"
module = "kaldi.matrix.kaldi_vector"
sources = ["{build}/kaldi/matrix/kaldi-vector-clifwrap.cc"]
link = ["matrix_common", "kaldi-matrix"]

[[extension]]
name = "matrix_common"
module = "kaldi.matrix.matrix_common"
sources = ["{build}/kaldi/matrix/matrix-common-clifwrap.cc"]
link = ["kaldi-matrix"]
"#;

    fn project(manifest: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), MANIFEST_NAME, manifest);
        write_file(tmp.path(), "kaldi/__init__.py", "");
        write_file(tmp.path(), "kaldi/matrix/__init__.py", "");
        tmp
    }

    /// Executor that "builds" artifacts by creating the expected files.
    fn building_executor(root: &std::path::Path) -> MockExecutor {
        let executor = MockExecutor::new();
        executor.set_default(MockProcessOutput::success(""));
        for name in ["kaldi_vector", "matrix_common"] {
            executor.on_call_create(
                &format!("temp/{}/cmake --config", name),
                root.join(format!("build/lib/kaldi/matrix/{}.so", name)),
            );
        }
        executor
    }

    #[cfg(unix)]
    #[test]
    fn test_dependency_built_first() {
        let tmp = project(MANIFEST);
        let install = fake_install();
        let ws = workspace_at(tmp.path());
        let executor = building_executor(tmp.path());

        let result = build(&ws, &install.env(), &executor, &BuildOptions::default()).unwrap();

        let names: Vec<&str> = result.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["matrix_common", "kaldi_vector"]);
        assert!(!result.debug);

        let calls = executor.calls();
        let first = calls.iter().position(|c| c.contains("temp/matrix_common")).unwrap();
        let second = calls.iter().position(|c| c.contains("temp/kaldi_vector")).unwrap();
        assert!(first < second);
        // No CMakeLists.txt in the project, so no wrapper step and no numpy query.
        assert_eq!(calls.len(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_is_idempotent() {
        let tmp = project(MANIFEST);
        let install = fake_install();
        let ws = workspace_at(tmp.path());

        let first = build(&ws, &install.env(), &building_executor(tmp.path()), &BuildOptions::default())
            .unwrap();
        let second = build(&ws, &install.env(), &building_executor(tmp.path()), &BuildOptions::default())
            .unwrap();

        assert_eq!(first.artifacts, second.artifacts);
        assert_eq!(first.staged.extensions, second.staged.extensions);
    }

    #[cfg(unix)]
    #[test]
    fn test_cycle_fails_before_any_process() {
        let tmp = project(&MANIFEST.replace("link = [\"kaldi-matrix\"]", "link = [\"kaldi_vector\"]"));
        let install = fake_install();
        let ws = workspace_at(tmp.path());
        let executor = MockExecutor::new();

        let err = build(&ws, &install.env(), &executor, &BuildOptions::default()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::CyclicDependency { .. })
        ));
        assert!(executor.calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_kaldi_dir_fails_before_any_process() {
        let tmp = project(MANIFEST);
        let install = fake_install();
        let ws = workspace_at(tmp.path());
        let executor = MockExecutor::new();
        let env = install.env().without_var("KALDI_DIR");

        let err = build(&ws, &env, &executor, &BuildOptions::default()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingConfiguration { var, .. }) if var == "KALDI_DIR"
        ));
        assert!(executor.calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_target_filter_and_debug() {
        let tmp = project(MANIFEST);
        let install = fake_install();
        let ws = workspace_at(tmp.path());
        let executor = building_executor(tmp.path());

        let opts = BuildOptions {
            debug: true,
            targets: vec!["matrix_common".to_string()],
            ..Default::default()
        };
        let result = build(&ws, &install.env(), &executor, &opts).unwrap();

        assert_eq!(result.artifacts.len(), 1);
        assert!(result.debug);
        assert!(executor.calls()[0].contains("-DCMAKE_BUILD_TYPE=Debug"));
    }

    #[cfg(unix)]
    #[test]
    fn test_numpy_queried_when_referenced() {
        let manifest = MANIFEST.replace("[\"{kaldi_src}\"]", "[\"{kaldi_src}\", \"{numpy_include}\"]");
        let tmp = project(&manifest);
        let install = fake_install();
        let ws = workspace_at(tmp.path());

        let executor = building_executor(tmp.path());
        executor.expect_contains("numpy.get_include", MockProcessOutput::success("/np/include\n"));

        build(&ws, &install.env(), &executor, &BuildOptions::default()).unwrap();

        let listfile = std::fs::read_to_string(
            tmp.path().join("build/temp/matrix_common/src/CMakeLists.txt"),
        )
        .unwrap();
        assert!(listfile.contains("\"/np/include\""));
    }
}
