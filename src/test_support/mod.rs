//! Test utilities and mocks for kaldiwrap unit tests.
//!
//! Process execution and the environment are the two seams the build
//! pipeline talks to the outside world through; both have mocks here.
//!
//! # Example
//!
//! ```rust,ignore
//! use kaldiwrap::test_support::{MockExecutor, MockProcessOutput};
//!
//! #[test]
//! fn test_example() {
//!     let exec = MockExecutor::new();
//!     exec.expect_contains("cmake --build", MockProcessOutput::success(""));
//!
//!     // Pass `&exec` wherever a `&dyn Executor` is expected...
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use tempfile::TempDir;

use crate::builder::context::{BuildContext, Profile};
use crate::builder::toolchain::{EnvSource, ToolchainConfig};
use crate::core::manifest::Manifest;
use crate::core::Workspace;
use crate::util::process::{Executor, ProcessBuilder, ProcessOutput};
use crate::util::GlobalContext;

/// Environment backed by a map instead of the process environment.
#[derive(Debug, Clone)]
pub struct MockEnv {
    vars: HashMap<String, String>,
    cwd: PathBuf,
}

impl MockEnv {
    pub fn new() -> Self {
        MockEnv {
            vars: HashMap::new(),
            cwd: PathBuf::from("/"),
        }
    }

    pub fn with_var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    pub fn without_var(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }

    pub fn with_current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = dir.as_ref().to_path_buf();
        self
    }
}

impl Default for MockEnv {
    fn default() -> Self {
        MockEnv::new()
    }
}

impl EnvSource for MockEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn current_dir(&self) -> PathBuf {
        self.cwd.clone()
    }
}

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl From<MockProcessOutput> for ProcessOutput {
    fn from(output: MockProcessOutput) -> Self {
        ProcessOutput {
            status: Some(output.status),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

#[derive(Debug)]
struct Expectation {
    contains: String,
    output: MockProcessOutput,
    /// File to create when the command runs, simulating a build output
    creates: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct MockState {
    expectations: Vec<Expectation>,
    calls: Vec<String>,
    default_output: Option<MockProcessOutput>,
}

/// Mock process executor.
///
/// Commands are matched against expectations in the order they were
/// registered, by substring of their display form. Unmatched commands get
/// the default output, or fail if there is none.
#[derive(Debug, Default)]
pub struct MockExecutor {
    state: Mutex<MockState>,
}

impl MockExecutor {
    pub fn new() -> Self {
        MockExecutor::default()
    }

    /// Answer commands containing `substring` with `output`.
    pub fn expect_contains(&self, substring: &str, output: MockProcessOutput) -> &Self {
        self.push(Expectation {
            contains: substring.to_string(),
            output,
            creates: None,
        })
    }

    /// Succeed on commands containing `substring` and create `file`.
    pub fn on_call_create(&self, substring: &str, file: impl Into<PathBuf>) -> &Self {
        self.push(Expectation {
            contains: substring.to_string(),
            output: MockProcessOutput::success(""),
            creates: Some(file.into()),
        })
    }

    /// Output for commands no expectation matches.
    pub fn set_default(&self, output: MockProcessOutput) -> &Self {
        self.lock().default_output = Some(output);
        self
    }

    /// Every command run so far, in display form.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn push(&self, expectation: Expectation) -> &Self {
        self.lock().expectations.push(expectation);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Executor for MockExecutor {
    fn run(&self, process: &ProcessBuilder) -> Result<ProcessOutput> {
        let cmd = process.display_command();
        let mut state = self.lock();
        state.calls.push(cmd.clone());

        if let Some(exp) = state.expectations.iter().find(|e| cmd.contains(&e.contains)) {
            if let Some(file) = &exp.creates {
                write_file(file, "", "mock artifact");
            }
            return Ok(exp.output.clone().into());
        }

        match &state.default_output {
            Some(output) => Ok(output.clone().into()),
            None => bail!("unexpected command: {}", cmd),
        }
    }
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: impl AsRef<Path>, rel: &str, contents: &str) -> PathBuf {
    let path = if rel.is_empty() {
        root.as_ref().to_path_buf()
    } else {
        root.as_ref().join(rel)
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Create an executable stub `dir/name`.
pub fn write_executable(dir: &Path, name: &str) -> PathBuf {
    let path = write_file(dir, name, "#!/bin/sh\nexit 0\n");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    path
}

/// A throwaway CLIF + Kaldi install: stub tools on a private PATH and an
/// empty Kaldi tree.
pub struct FakeInstall {
    _tmp: TempDir,
    pub bin: PathBuf,
    pub kaldi: PathBuf,
}

impl FakeInstall {
    /// Environment that locates this install.
    pub fn env(&self) -> MockEnv {
        MockEnv::new()
            .with_var("PATH", self.bin.display().to_string())
            .with_var("KALDI_DIR", self.kaldi.display().to_string())
    }
}

pub fn fake_install() -> FakeInstall {
    let tmp = TempDir::new().unwrap();
    let bin = tmp.path().join("clif/bin");
    let kaldi = tmp.path().join("kaldi");
    std::fs::create_dir_all(kaldi.join("src/lib")).unwrap();

    for tool in ["pyclif", "cmake", "python3"] {
        write_executable(&bin, tool);
    }

    FakeInstall {
        _tmp: tmp,
        bin,
        kaldi,
    }
}

/// Workspace rooted at `root`, ignoring the user's global config.
pub fn workspace_at(root: impl AsRef<Path>) -> Workspace {
    let ctx = GlobalContext::with_cwd(root.as_ref().to_path_buf()).with_global_config(None);
    Workspace::load(&ctx, None).unwrap()
}

/// Toolchain with fixed, nonexistent paths.
pub fn test_toolchain() -> ToolchainConfig {
    ToolchainConfig {
        pyclif: PathBuf::from("/opt/clif/bin/pyclif"),
        clif_dir: PathBuf::from("/opt/clif"),
        kaldi_dir: PathBuf::from("/opt/kaldi"),
        kaldi_src_dir: PathBuf::from("/opt/kaldi/src"),
        kaldi_lib_dir: PathBuf::from("/opt/kaldi/src/lib"),
        cmake: PathBuf::from("/usr/bin/cmake"),
        python: PathBuf::from("/usr/bin/python3"),
        numpy_include: Some(PathBuf::from("/usr/include/numpy")),
        debug: false,
        cxx_flags: Vec::new(),
    }
}

/// Release context over the bundled manifest, building into `root/build`.
pub fn test_context(root: impl AsRef<Path>) -> BuildContext {
    let root = root.as_ref();
    BuildContext {
        toolchain: test_toolchain(),
        settings: Manifest::builtin().unwrap().build,
        project_root: root.to_path_buf(),
        build_root: root.join("build"),
        profile: Profile::Release,
        jobs: None,
        generator: None,
    }
}
